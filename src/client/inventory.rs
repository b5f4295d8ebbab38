//! Node inventory through the gateway's Network Management Proxy.

use rand::{rngs::OsRng, Rng};
use tracing::{debug, info, warn};

use super::connection::{NodeAddress, ZipConnection};
use crate::core::commands::network_management_proxy;
use crate::core::{
    command_class, ZipError, ZipResult, NODE_INFO_NO_REFRESH, NODE_LIST_MASK_OFFSET,
    NODE_LIST_MASK_SIZE,
};
use crate::transport::DatagramTransport;

/// Minimum Node Info Cached Report payload carrying the device classes.
const NODE_INFO_MIN_SIZE: usize = 8;

/// A node known to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Z-Wave node id.
    pub node_id: u8,
    /// Basic device class.
    pub basic_device_class: u8,
    /// Generic device class.
    pub generic_device_class: u8,
    /// Specific device class.
    pub specific_device_class: u8,
    /// IP address of the node.
    pub address: NodeAddress,
}

/// Decode the node bitmask of a Node List Report.
///
/// Bit `b` of byte `i` set means node `i * 8 + b + 1` is present. A mask
/// shorter than 29 bytes lists fewer nodes.
pub fn decode_node_mask(mask: &[u8]) -> Vec<u8> {
    let mut nodes = Vec::new();
    for (index, byte) in mask.iter().take(NODE_LIST_MASK_SIZE).enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                nodes.push((index * 8 + bit + 1) as u8);
            }
        }
    }
    nodes
}

/// Correlation values for Network Management Proxy requests.
///
/// Starts at a random value and wraps.
#[derive(Debug)]
struct ProxySequence(u8);

impl ProxySequence {
    fn random() -> Self {
        Self(OsRng.r#gen())
    }

    fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

/// List every node of the gateway's network with its device classes and
/// IP address.
///
/// Fails if the node list cannot be fetched. A node whose cached info or
/// address cannot be fetched is left out.
pub async fn request_node_list<T: DatagramTransport>(
    connection: &ZipConnection<T>,
) -> ZipResult<Vec<NodeInfo>> {
    let mut sequence = ProxySequence::random();

    let seq = sequence.next();
    let report = connection
        .send_message_and_wait_for_response(
            command_class::NETWORK_MANAGEMENT_PROXY,
            network_management_proxy::NODE_LIST_GET,
            &[seq],
            network_management_proxy::NODE_LIST_REPORT,
            Some(seq),
        )
        .await?;

    if report.payload.len() < NODE_LIST_MASK_OFFSET {
        return Err(ZipError::MalformedResponse(format!(
            "node list report of {} bytes",
            report.payload.len()
        )));
    }
    let node_ids = decode_node_mask(&report.payload[NODE_LIST_MASK_OFFSET..]);
    debug!(count = node_ids.len(), "node list received");

    let mut nodes = Vec::with_capacity(node_ids.len());
    for node_id in node_ids {
        match request_node_info(connection, &mut sequence, node_id).await {
            Ok(node) => nodes.push(node),
            Err(err) => warn!(node_id, %err, "node skipped"),
        }
    }

    info!(count = nodes.len(), "node inventory complete");
    Ok(nodes)
}

async fn request_node_info<T: DatagramTransport>(
    connection: &ZipConnection<T>,
    sequence: &mut ProxySequence,
    node_id: u8,
) -> ZipResult<NodeInfo> {
    let seq = sequence.next();
    let report = connection
        .send_message_and_wait_for_response(
            command_class::NETWORK_MANAGEMENT_PROXY,
            network_management_proxy::NODE_INFO_CACHED_GET,
            &[seq, NODE_INFO_NO_REFRESH, node_id],
            network_management_proxy::NODE_INFO_CACHED_REPORT,
            Some(seq),
        )
        .await?;

    let payload = &report.payload;
    if payload.len() < NODE_INFO_MIN_SIZE {
        return Err(ZipError::MalformedResponse(format!(
            "node info report of {} bytes",
            payload.len()
        )));
    }

    let address = connection.get_ip_address_for_node_id(node_id).await?;

    Ok(NodeInfo {
        node_id,
        basic_device_class: payload[5],
        generic_device_class: payload[6],
        specific_device_class: payload[7],
        address,
    })
}
