//! Datagram transport seam and the tokio UDP implementation.
//!
//! The session never talks to a socket directly. It hands encoded frames to a
//! [`DatagramTransport`] together with the pre-shared-key credentials the
//! secured channel needs, and receives decrypted payloads back through
//! [`ZipConnection::handle_datagram`].
//!
//! [`ZipConnection::handle_datagram`]: crate::client::ZipConnection::handle_datagram

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{ZipError, ZipResult};

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Pre-shared-key credentials for the secured datagram channel.
///
/// Both parts are zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PskCredentials {
    identity: Vec<u8>,
    secret: Vec<u8>,
}

impl PskCredentials {
    /// Create credentials. Neither part may be empty.
    pub fn new(identity: impl Into<Vec<u8>>, secret: impl Into<Vec<u8>>) -> ZipResult<Self> {
        let identity = identity.into();
        let secret = secret.into();

        if identity.is_empty() {
            return Err(ZipError::InvalidArgument("PSK identity is empty".into()));
        }
        if secret.is_empty() {
            return Err(ZipError::InvalidArgument("PSK secret is empty".into()));
        }

        Ok(Self { identity, secret })
    }

    /// Get the PSK identity.
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Get the PSK secret.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A secured datagram channel as seen by a session.
///
/// Delivery is confirmed by Z/IP ACKs, not by the transport: `send_to`
/// completes once the datagram is handed to the channel. Implementations
/// deliver inbound payloads by calling [`ZipConnection::handle_datagram`].
///
/// [`ZipConnection::handle_datagram`]: crate::client::ZipConnection::handle_datagram
pub trait DatagramTransport: Send + Sync + 'static {
    /// Send a datagram to `remote`.
    fn send_to(
        &self,
        payload: &[u8],
        remote: SocketAddr,
        credentials: &PskCredentials,
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Release the channel. Called once when the session closes.
    fn close(&self) {}
}

/// Tokio UDP transport.
///
/// Carries frames in the clear. Use it against a gateway in plain-text mode
/// or behind a local proxy that terminates the secured channel.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    recv_buffer_size: usize,
}

impl UdpTransport {
    /// Bind a transport to the given local address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        UdpTransportBuilder::new().bind(addr).await
    }

    /// Bind an ephemeral port of the same address family as `remote`.
    pub async fn bind_for(remote: SocketAddr) -> io::Result<Self> {
        UdpTransportBuilder::new().bind_for(remote).await
    }

    /// Create a transport from an existing UDP socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        UdpTransportBuilder::new().from_socket(socket)
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive buffer size used by readers of this transport.
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }

    /// Get a clone of the Arc-wrapped socket.
    pub fn socket_arc(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Receive data and return the sender's address.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

impl DatagramTransport for UdpTransport {
    async fn send_to(
        &self,
        payload: &[u8],
        remote: SocketAddr,
        _credentials: &PskCredentials,
    ) -> io::Result<()> {
        self.socket.send_to(payload, remote).await.map(|_| ())
    }
}

/// Builder for creating UDP transports with custom options.
#[derive(Debug, Clone)]
pub struct UdpTransportBuilder {
    recv_buffer_size: usize,
    broadcast: bool,
}

impl Default for UdpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpTransportBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            broadcast: false,
        }
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Allow sending to broadcast addresses.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Bind to the given address and create a transport.
    pub async fn bind(self, addr: SocketAddr) -> io::Result<UdpTransport> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(self.broadcast)?;
        Ok(self.from_socket(socket))
    }

    /// Bind an ephemeral port of the same address family as `remote`.
    pub async fn bind_for(self, remote: SocketAddr) -> io::Result<UdpTransport> {
        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        self.bind(local).await
    }

    /// Create a transport from an existing UDP socket.
    pub fn from_socket(self, socket: UdpSocket) -> UdpTransport {
        UdpTransport {
            socket: Arc::new(socket),
            recv_buffer_size: self.recv_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> PskCredentials {
        PskCredentials::new("Client_identity", hex::decode("123456789012345678901234567890aa").unwrap())
            .unwrap()
    }

    #[test]
    fn test_credentials_validation() {
        assert!(matches!(
            PskCredentials::new("", vec![1u8]),
            Err(ZipError::InvalidArgument(_))
        ));
        assert!(matches!(
            PskCredentials::new("id", Vec::new()),
            Err(ZipError::InvalidArgument(_))
        ));

        let creds = credentials();
        assert_eq!(creds.identity(), b"Client_identity");
        assert_eq!(creds.secret().len(), 16);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("Client_identity"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("18"));
    }

    #[tokio::test]
    async fn test_transport_bind() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();
        assert!(addr.port() != 0);
        assert_eq!(transport.recv_buffer_size(), DEFAULT_RECV_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_bind_for_matches_family() {
        let transport = UdpTransport::bind_for("127.0.0.1:41230".parse().unwrap())
            .await
            .unwrap();
        assert!(transport.local_addr().unwrap().is_ipv4());
    }

    #[tokio::test]
    async fn test_transport_send_recv() {
        let server = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();

        let client = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let data = [0x23, 0x02, 0x80, 0xd0, 0x01, 0x00, 0x00];
        DatagramTransport::send_to(&client, &data, server_addr, &credentials())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = server.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &data);
        assert_eq!(from, client.local_addr().unwrap());
    }

    #[test]
    fn test_transport_builder() {
        let builder = UdpTransportBuilder::new()
            .recv_buffer_size(4096)
            .broadcast(true);

        assert_eq!(builder.recv_buffer_size, 4096);
        assert!(builder.broadcast);
    }
}
