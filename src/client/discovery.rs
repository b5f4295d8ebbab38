//! Gateway discovery on the local IPv4 networks.
//!
//! A Z/IP Packet carrying a Node Info Cached Get is broadcast to the
//! discovery port, then sent to every host of each attached subnet. The
//! first gateway that echoes the probe's sequence number wins.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use if_addrs::{get_if_addrs, IfAddr};
use rand::{rngs::OsRng, Rng};
use tokio::time;
use tracing::{debug, info, trace};

use crate::core::commands::network_management_proxy;
use crate::core::{
    command_class, ZipError, ZipResult, DISCOVERY_MAX_PROBES, DISCOVERY_PORT,
    DISCOVERY_PROBE_INTERVAL, DISCOVERY_REPLY_MIN_SIZE, DISCOVERY_REPLY_SEQUENCE_OFFSET,
    DISCOVERY_SETTLE_TIME, ZIP_COMMAND_CLASS, ZIP_PACKET_COMMAND,
};
use crate::transport::{encode_unacknowledged, UdpTransportBuilder};

/// Gateway discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Gateway discovery port.
    pub port: u16,
    /// Pause between unicast probes.
    pub probe_interval: Duration,
    /// Maximum unicast probes per interface.
    pub max_probes_per_interface: u32,
    /// Time to wait for replies after the last probe.
    pub settle_time: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DISCOVERY_PORT,
            probe_interval: DISCOVERY_PROBE_INTERVAL,
            max_probes_per_interface: DISCOVERY_MAX_PROBES,
            settle_time: DISCOVERY_SETTLE_TIME,
        }
    }
}

/// Find a Z/IP gateway on the local IPv4 networks and return its address.
///
/// Fails with [`ZipError::GatewayNotFound`] if no gateway replied by the
/// end of the settle time.
pub async fn discover_gateway(config: DiscoveryConfig) -> ZipResult<Ipv4Addr> {
    let mut targets = vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), config.port)];

    for iface in get_if_addrs()? {
        let IfAddr::V4(v4) = iface.addr else {
            continue;
        };
        if v4.ip.is_loopback() {
            continue;
        }
        let hosts = subnet_hosts(v4.ip, v4.netmask, config.max_probes_per_interface);
        info!(interface = %iface.name, local = %v4.ip, hosts = hosts.len(), "probing subnet for Z/IP gateway");
        targets.extend(
            hosts
                .into_iter()
                .map(|host| SocketAddr::new(IpAddr::V4(host), config.port)),
        );
    }

    probe(&config, &targets).await
}

/// Send the discovery probe to each target in turn and wait for the first
/// valid reply.
async fn probe(config: &DiscoveryConfig, targets: &[SocketAddr]) -> ZipResult<Ipv4Addr> {
    let transport = UdpTransportBuilder::new()
        .broadcast(true)
        .bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
        .await?;
    let socket = transport.socket_arc();

    let seq: u8 = OsRng.r#gen();
    let packet = encode_unacknowledged(
        seq,
        command_class::NETWORK_MANAGEMENT_PROXY,
        network_management_proxy::NODE_INFO_CACHED_GET,
        &[seq, 0xf0, 0x00],
    );

    let sender = async {
        for (index, target) in targets.iter().enumerate() {
            if index > 0 {
                time::sleep(config.probe_interval).await;
            }
            if let Err(err) = socket.send_to(&packet, *target).await {
                debug!(%target, %err, "discovery probe not sent");
            }
        }
        time::sleep(config.settle_time).await;
    };
    tokio::pin!(sender);

    let mut buf = vec![0u8; transport.recv_buffer_size()];
    loop {
        tokio::select! {
            _ = &mut sender => {
                info!(probes = targets.len(), "no Z/IP gateway replied");
                return Err(ZipError::GatewayNotFound);
            }
            recv = socket.recv_from(&mut buf) => {
                let (len, src) = recv?;
                match src {
                    SocketAddr::V4(v4) if is_discovery_reply(&buf[..len], seq) => {
                        info!(gateway = %v4.ip(), "found Z/IP gateway");
                        return Ok(*v4.ip());
                    }
                    _ => trace!(%src, len, "ignoring discovery datagram"),
                }
            }
        }
    }
}

/// Check whether a datagram answers the probe with sequence number `seq`.
pub fn is_discovery_reply(data: &[u8], seq: u8) -> bool {
    data.len() >= DISCOVERY_REPLY_MIN_SIZE
        && data[0] == ZIP_COMMAND_CLASS
        && data[1] == ZIP_PACKET_COMMAND
        && data[DISCOVERY_REPLY_SEQUENCE_OFFSET] == seq
}

/// Host addresses of the subnet of `ip`, in ascending order.
///
/// Yields host numbers `1..` of the network, at most `max` of them and never
/// the broadcast address.
pub fn subnet_hosts(ip: Ipv4Addr, netmask: Ipv4Addr, max: u32) -> Vec<Ipv4Addr> {
    let mask = u32::from(netmask);
    let network = u32::from(ip) & mask;
    let host_bits = mask.leading_ones();
    let last_host = match host_bits {
        32 => 0,
        // a /31 has no broadcast address
        31 => 1,
        bits => (1u32 << (32 - bits)) - 2,
    };

    (1..=last_host.min(max))
        .map(|host| Ipv4Addr::from(network | host))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket;

    #[test]
    fn test_subnet_hosts() {
        let hosts = subnet_hosts(
            Ipv4Addr::new(192, 168, 1, 37),
            Ipv4Addr::new(255, 255, 255, 0),
            1023,
        );
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn test_subnet_hosts_capped() {
        let hosts = subnet_hosts(
            Ipv4Addr::new(10, 20, 30, 40),
            Ipv4Addr::new(255, 0, 0, 0),
            DISCOVERY_MAX_PROBES,
        );
        assert_eq!(hosts.len(), 1023);
        assert_eq!(hosts[0], Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(hosts[1022], Ipv4Addr::new(10, 0, 3, 255));
    }

    #[test]
    fn test_subnet_hosts_small_networks() {
        let ip = Ipv4Addr::new(172, 16, 0, 5);
        assert!(subnet_hosts(ip, Ipv4Addr::new(255, 255, 255, 255), 1023).is_empty());
        assert_eq!(
            subnet_hosts(ip, Ipv4Addr::new(255, 255, 255, 252), 1023),
            vec![Ipv4Addr::new(172, 16, 0, 5), Ipv4Addr::new(172, 16, 0, 6)]
        );
    }

    #[test]
    fn test_is_discovery_reply() {
        let mut reply = hex::decode("230240400700005204070001010800").unwrap();
        reply[14] = 0x07;
        assert!(is_discovery_reply(&reply, 0x07));
        assert!(!is_discovery_reply(&reply, 0x08));
        assert!(!is_discovery_reply(&reply[..14], 0x07));

        reply[0] = 0x52;
        assert!(!is_discovery_reply(&reply, 0x07));
    }

    #[tokio::test]
    async fn test_probe_finds_gateway() {
        let gateway = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let gateway_addr = gateway.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = gateway.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..4], &[0x23, 0x02, 0x00, 0x40]);
            assert_eq!(&buf[7..9], &[0x52, 0x03]);
            assert_eq!(len, 12);
            let seq = buf[4];

            // wrong sequence number first
            let mut reply = vec![0x23, 0x02, 0x40, 0x40, seq, 0x00, 0x00, 0x52, 0x04, seq];
            reply.extend_from_slice(&[0x00, 0x01, 0x01, 0x08, seq.wrapping_add(1)]);
            gateway.send_to(&reply, from).await.unwrap();

            reply[14] = seq;
            gateway.send_to(&reply, from).await.unwrap();
        });

        let config = DiscoveryConfig::default();
        let found = probe(&config, &[gateway_addr]).await.unwrap();
        assert_eq!(found, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_gateway_not_found() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DiscoveryConfig {
            settle_time: Duration::from_millis(50),
            ..DiscoveryConfig::default()
        };

        let result = probe(&config, &[silent.local_addr().unwrap()]).await;
        assert!(matches!(result, Err(ZipError::GatewayNotFound)));
    }
}
