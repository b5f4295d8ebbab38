//! Z/IP session to a gateway.
//!
//! Provides [`ZipConnection`], which sequences outgoing Z/IP Packets, runs
//! the ACK/NAK state machine and hands inbound commands to the request
//! waiting for them.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use super::ack::{AckOutcome, AckTable, NakAction, NakKind, Reservation};
use super::pending::{Response, ResponseOutcome, ResponseRegistry, ResponseToken};
use crate::core::commands::zip_nd;
use crate::core::{
    command_class, format_ipv4, format_ipv6, mapped_ipv4, ZipError, ZipResult, ACK_TIMEOUT,
    HOME_ID_SIZE, IPV6_ADDRESS_SIZE, NODE_ADVERTISEMENT_MIN_SIZE, QUEUE_FULL_EXTENSION,
    QUEUE_FULL_RETRY_DELAY, RESPONSE_TIMEOUT, WAITING_EXTENSION, ZIP_PORT,
};
use crate::transport::{
    decode, encode_raw, encode_zip_packet, spawn_timer, DatagramTransport, Frame, PskCredentials,
    TimerCheck, UdpTransport,
};

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Gateway UDP port.
    pub port: u16,

    /// Time allowed for an ACK.
    pub ack_timeout: Duration,

    /// Time allowed for a response once the request is acknowledged.
    pub response_timeout: Duration,

    /// Deadline extension after a queue-full NAK.
    pub queue_full_extension: Duration,

    /// Back-off before a queue-full request is sent again.
    pub queue_full_retry_delay: Duration,

    /// Deadline extension after a waiting NAK.
    pub waiting_extension: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: ZIP_PORT,
            ack_timeout: ACK_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            queue_full_extension: QUEUE_FULL_EXTENSION,
            queue_full_retry_delay: QUEUE_FULL_RETRY_DELAY,
            waiting_extension: WAITING_EXTENSION,
        }
    }
}

/// Builder for creating a [`ZipConnection`].
#[derive(Debug, Default)]
pub struct ZipConnectionBuilder {
    config: SessionConfig,
}

impl ZipConnectionBuilder {
    /// Create a new builder with default timing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gateway port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the ACK timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the response timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Set the queue-full deadline extension.
    pub fn queue_full_extension(mut self, extension: Duration) -> Self {
        self.config.queue_full_extension = extension;
        self
    }

    /// Set the queue-full retransmission back-off.
    pub fn queue_full_retry_delay(mut self, delay: Duration) -> Self {
        self.config.queue_full_retry_delay = delay;
        self
    }

    /// Set the waiting deadline extension.
    pub fn waiting_extension(mut self, extension: Duration) -> Self {
        self.config.waiting_extension = extension;
        self
    }

    /// Build the session configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }

    /// Open a UDP session to the gateway at `address` (an IPv4 or IPv6
    /// literal).
    pub async fn connect(
        self,
        address: &str,
        identity: impl Into<Vec<u8>>,
        secret: impl Into<Vec<u8>>,
    ) -> ZipResult<ZipConnection> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| ZipError::InvalidArgument(format!("not an IP address: {address:?}")))?;
        let credentials = PskCredentials::new(identity, secret)?;
        let remote = SocketAddr::new(ip, self.config.port);

        let transport = UdpTransport::bind_for(remote).await?;
        let connection = self.with_transport(transport, remote, credentials);
        connection.spawn_reader();

        info!(%remote, "Z/IP session opened");
        Ok(connection)
    }

    /// Create a session over a caller-supplied transport.
    ///
    /// The caller feeds inbound payloads to
    /// [`ZipConnection::handle_datagram`].
    pub fn with_transport<T: DatagramTransport>(
        self,
        transport: T,
        remote: SocketAddr,
        credentials: PskCredentials,
    ) -> ZipConnection<T> {
        let acks = AckTable::with_random_start(
            self.config.queue_full_extension,
            self.config.waiting_extension,
        );

        ZipConnection {
            shared: Arc::new(Shared {
                transport,
                remote,
                credentials,
                config: self.config,
                state: Mutex::new(SessionState {
                    acks,
                    responses: ResponseRegistry::new(),
                    closed: false,
                }),
                reader: OnceLock::new(),
            }),
        }
    }
}

/// Address information for a node, from a Node Advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    /// IPv6 address in canonical text form (IPv4-mapped when applicable).
    pub ipv6: String,
    /// IPv4 address, when the advertised address is IPv4-mapped.
    pub ipv4: Option<String>,
    /// Z-Wave home id.
    pub home_id: [u8; HOME_ID_SIZE],
}

impl NodeAddress {
    /// Parse a Node Advertisement payload for `node_id`.
    pub fn from_advertisement(node_id: u8, payload: &[u8]) -> ZipResult<Self> {
        if payload.len() < NODE_ADVERTISEMENT_MIN_SIZE {
            return Err(ZipError::MalformedResponse(format!(
                "node advertisement of {} bytes",
                payload.len()
            )));
        }
        if payload[1] != node_id {
            return Err(ZipError::MalformedResponse(format!(
                "advertisement for node {} instead of {}",
                payload[1], node_id
            )));
        }

        let mut address = [0u8; IPV6_ADDRESS_SIZE];
        address.copy_from_slice(&payload[2..2 + IPV6_ADDRESS_SIZE]);
        let mut home_id = [0u8; HOME_ID_SIZE];
        let home_offset = 2 + IPV6_ADDRESS_SIZE;
        home_id.copy_from_slice(&payload[home_offset..home_offset + HOME_ID_SIZE]);

        Ok(Self {
            ipv6: format_ipv6(&address),
            ipv4: mapped_ipv4(&address).map(|v4| format_ipv4(&v4)),
            home_id,
        })
    }
}

struct SessionState {
    acks: AckTable,
    responses: ResponseRegistry,
    closed: bool,
}

struct Shared<T> {
    transport: T,
    remote: SocketAddr,
    credentials: PskCredentials,
    config: SessionConfig,
    state: Mutex<SessionState>,
    reader: OnceLock<AbortHandle>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get() {
            reader.abort();
        }
    }
}

/// A Z/IP session with one gateway.
///
/// Cheap to clone; all clones share the sequence counter, the ACK table and
/// the response registry. Requests may be issued concurrently.
///
/// # Example
///
/// ```no_run
/// use zwave_ip::client::ZipConnection;
/// use zwave_ip::core::{command_class, commands::switch_binary};
///
/// # async fn run() -> zwave_ip::ZipResult<()> {
/// let conn = ZipConnection::connect("192.168.1.10", "Client_identity", vec![0x12; 16]).await?;
///
/// conn.send_message(command_class::SWITCH_BINARY, switch_binary::SET, &[0xff]).await?;
///
/// let report = conn
///     .send_message_and_wait_for_response(
///         command_class::SWITCH_BINARY,
///         switch_binary::GET,
///         &[],
///         switch_binary::REPORT,
///         None,
///     )
///     .await?;
/// println!("switch is {:?}", report.payload);
///
/// conn.close().await;
/// # Ok(())
/// # }
/// ```
pub struct ZipConnection<T: DatagramTransport = UdpTransport> {
    shared: Arc<Shared<T>>,
}

impl<T: DatagramTransport> Clone for ZipConnection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: DatagramTransport> std::fmt::Debug for ZipConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipConnection")
            .field("remote", &self.shared.remote)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl ZipConnection {
    /// Open a UDP session with default timing.
    pub async fn connect(
        address: &str,
        identity: impl Into<Vec<u8>>,
        secret: impl Into<Vec<u8>>,
    ) -> ZipResult<Self> {
        ZipConnectionBuilder::new()
            .connect(address, identity, secret)
            .await
    }

    fn spawn_reader(&self) {
        let socket = self.shared.transport.socket_arc();
        let buffer_size = self.shared.transport.recv_buffer_size();
        let remote = self.shared.remote;
        let weak = Arc::downgrade(&self.shared);

        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; buffer_size];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(err) if is_transient_recv_error(&err) => {
                        debug!(%err, "receive failed, retrying");
                        tokio::time::sleep(RECV_RETRY_DELAY).await;
                        continue;
                    }
                    Err(err) => {
                        warn!(%err, "receive loop stopped");
                        break;
                    }
                };
                if from != remote {
                    trace!(%from, "datagram from unexpected peer dropped");
                    continue;
                }
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                ZipConnection { shared }.handle_datagram(&buf[..len]).await;
            }
        })
        .abort_handle();

        if let Err(handle) = self.shared.reader.set(handle) {
            handle.abort();
        }
    }
}

impl<T: DatagramTransport> ZipConnection<T> {
    /// Gateway address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.shared.remote
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Check if [`close`](Self::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.closed
    }

    /// Send a command and wait for the gateway's ACK.
    ///
    /// Fails with [`ZipError::Nak`] if the gateway rejects the command and
    /// [`ZipError::Timeout`] if no ACK arrives in time.
    pub async fn send_message(&self, command_class: u8, command: u8, payload: &[u8]) -> ZipResult<()> {
        self.transmit(command_class, command, payload, None).await
    }

    /// Send a command, wait for its ACK, then wait for the response.
    ///
    /// The response registration is armed before the request leaves so a
    /// fast answer cannot be missed; a response that arrives before the ACK
    /// completes the request on its own.
    ///
    /// `correlation` narrows the match for response commands that echo a
    /// request identifier (see [`correlation_offset`]): Node List Report and
    /// Node Info Cached Report must echo it in byte 0, Node Advertisement in
    /// byte 1. For those commands a `Some` value that the gateway does not
    /// echo never matches and the request times out. For every other
    /// response command it is ignored.
    ///
    /// [`correlation_offset`]: crate::client::correlation_offset
    pub async fn send_message_and_wait_for_response(
        &self,
        command_class: u8,
        request_command: u8,
        payload: &[u8],
        response_command: u8,
        correlation: Option<u8>,
    ) -> ZipResult<Response> {
        let (tx, mut rx) = oneshot::channel();
        let token = self
            .register_response(command_class, response_command, correlation, true, tx)
            .await?;

        let (reservation, ack) = match self
            .dispatch(command_class, request_command, payload, Some(token))
            .await
        {
            Ok(dispatched) => dispatched,
            Err(err) => {
                self.shared.state.lock().await.responses.cancel(token);
                return Err(err);
            }
        };

        let acked = tokio::select! {
            biased;
            outcome = &mut rx => {
                // response beat the ACK
                self.shared.state.lock().await.acks.remove(reservation);
                return settle_response(outcome);
            }
            outcome = ack => settle_ack(outcome),
        };

        if let Err(err) = acked {
            self.shared.state.lock().await.responses.cancel(token);
            return Err(err);
        }

        self.shared
            .state
            .lock()
            .await
            .responses
            .extend(token, self.shared.config.response_timeout);

        settle_response(rx.await)
    }

    /// Send a raw command (no Z/IP Packet wrapper, no sequence number, no ACK).
    pub async fn send_raw_message(
        &self,
        command_class: u8,
        command: u8,
        payload: &[u8],
    ) -> ZipResult<()> {
        if self.is_closed().await {
            return Err(ZipError::Closed);
        }
        self.send_datagram(&encode_raw(command_class, command, payload))
            .await
    }

    /// Send a raw command and wait for a raw response of the same class.
    pub async fn send_raw_message_and_wait_for_response(
        &self,
        command_class: u8,
        request_command: u8,
        payload: &[u8],
        response_command: u8,
        correlation: Option<u8>,
    ) -> ZipResult<Response> {
        let (tx, rx) = oneshot::channel();
        let token = self
            .register_response(command_class, response_command, correlation, false, tx)
            .await?;

        let packet = encode_raw(command_class, request_command, payload);
        if let Err(err) = self.send_datagram(&packet).await {
            self.shared.state.lock().await.responses.cancel(token);
            return Err(err);
        }

        settle_response(rx.await)
    }

    /// Resolve the IP address of a Z-Wave node.
    ///
    /// Sends an Inverse Node Solicitation and waits for the Node
    /// Advertisement for `node_id`.
    pub async fn get_ip_address_for_node_id(&self, node_id: u8) -> ZipResult<NodeAddress> {
        if node_id == 0 {
            return Err(ZipError::InvalidArgument("node id 0".into()));
        }

        let response = self
            .send_raw_message_and_wait_for_response(
                command_class::ZIP_ND,
                zip_nd::INV_NODE_SOLICITATION,
                &[0, node_id],
                zip_nd::NODE_ADVERTISEMENT,
                Some(node_id),
            )
            .await?;

        NodeAddress::from_advertisement(node_id, &response.payload)
    }

    /// Process one decrypted datagram from the gateway.
    ///
    /// ACK and NAK flags are applied to the ACK table; independently, a
    /// carried command is offered to the waiting requests. Anything that
    /// does not decode is dropped.
    pub async fn handle_datagram(&self, data: &[u8]) {
        let frame = match decode(data) {
            Ok(frame) => frame,
            Err(err) => {
                trace!(%err, len = data.len(), "dropping datagram");
                return;
            }
        };

        let mut retransmit = None;
        {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return;
            }

            if let Frame::Wrapped(wrapped) = &frame {
                let seq = wrapped.sequence_number;
                if wrapped.ack_response() {
                    state.acks.on_ack(seq);
                } else if wrapped.nack_response() {
                    let kind = if wrapped.nack_queue_full() {
                        NakKind::QueueFull
                    } else if wrapped.nack_waiting() {
                        NakKind::Waiting
                    } else {
                        NakKind::Reject
                    };

                    let config = &self.shared.config;
                    match state.acks.on_nak(seq, kind) {
                        NakAction::Retransmit { id, linked } => {
                            if let Some(token) = linked {
                                state.responses.extend(
                                    token,
                                    config.queue_full_extension + config.response_timeout,
                                );
                            }
                            retransmit = Some(Reservation {
                                sequence_number: seq,
                                id,
                            });
                        }
                        NakAction::Extended { linked } => {
                            if let Some(token) = linked {
                                state.responses.extend(
                                    token,
                                    config.waiting_extension + config.response_timeout,
                                );
                            }
                        }
                        NakAction::Rejected | NakAction::Ignored => {}
                    }
                }
            }

            if let Some((command_class, command)) = frame.command() {
                state.responses.match_and_complete(
                    command_class,
                    command,
                    frame.is_wrapped(),
                    frame.payload(),
                );
            }
        }

        if let Some(reservation) = retransmit {
            self.schedule_retransmit(reservation);
        }
    }

    /// Close the session.
    ///
    /// Every outstanding request fails with [`ZipError::Closed`], the
    /// receive loop stops and the transport is released.
    pub async fn close(&self) {
        {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            state.acks.drain(AckOutcome::Closed);
            state.responses.drain(ResponseOutcome::Closed);
        }

        if let Some(reader) = self.shared.reader.get() {
            reader.abort();
        }
        self.shared.transport.close();
        info!(remote = %self.shared.remote, "Z/IP session closed");
    }

    async fn register_response(
        &self,
        command_class: u8,
        command: u8,
        correlation: Option<u8>,
        wrapped: bool,
        completion: oneshot::Sender<ResponseOutcome>,
    ) -> ZipResult<ResponseToken> {
        let mut state = self.shared.state.lock().await;
        if state.closed {
            return Err(ZipError::Closed);
        }

        let token = state.responses.register(
            command_class,
            command,
            correlation,
            self.shared.config.response_timeout,
            wrapped,
            completion,
        );
        let timer = self.spawn_response_timer(token);
        state.responses.attach_timer(token, timer);
        Ok(token)
    }

    /// Reserve a sequence number, send the Z/IP Packet and wait for the ACK.
    async fn transmit(
        &self,
        command_class: u8,
        command: u8,
        payload: &[u8],
        linked: Option<ResponseToken>,
    ) -> ZipResult<()> {
        let (_, ack) = self.dispatch(command_class, command, payload, linked).await?;
        settle_ack(ack.await)
    }

    /// Reserve a sequence number and send the Z/IP Packet. Returns the
    /// reservation and the receiver its ACK outcome is delivered on.
    async fn dispatch(
        &self,
        command_class: u8,
        command: u8,
        payload: &[u8],
        linked: Option<ResponseToken>,
    ) -> ZipResult<(Reservation, oneshot::Receiver<AckOutcome>)> {
        let (tx, rx) = oneshot::channel();

        let (reservation, packet) = {
            let mut state = self.shared.state.lock().await;
            if state.closed {
                return Err(ZipError::Closed);
            }

            let reservation = state
                .acks
                .reserve(self.shared.config.ack_timeout, linked, tx)
                .ok_or(ZipError::SequenceExhausted)?;
            let packet = encode_zip_packet(
                reservation.sequence_number,
                command_class,
                command,
                payload,
            );
            state.acks.store_packet(reservation, packet.clone());
            let timer = self.spawn_ack_timer(reservation);
            state.acks.attach_timer(reservation, timer);
            (reservation, packet)
        };

        if let Err(err) = self.send_datagram(&packet).await {
            let mut state = self.shared.state.lock().await;
            if let Some(token) = state.acks.remove(reservation) {
                state.responses.cancel(token);
            }
            return Err(err);
        }

        Ok((reservation, rx))
    }

    async fn send_datagram(&self, packet: &[u8]) -> ZipResult<()> {
        let shared = &self.shared;
        shared
            .transport
            .send_to(packet, shared.remote, &shared.credentials)
            .await
            .map_err(|err| {
                warn!(%err, remote = %shared.remote, "send failed");
                ZipError::Io(err)
            })
    }

    fn spawn_ack_timer(&self, reservation: Reservation) -> AbortHandle {
        let weak = Arc::downgrade(&self.shared);
        spawn_timer(self.shared.config.ack_timeout, move || {
            let weak = Weak::clone(&weak);
            async move {
                let Some(shared) = weak.upgrade() else {
                    return TimerCheck::Done;
                };
                let mut state = shared.state.lock().await;
                state.acks.on_timer(reservation)
            }
        })
    }

    fn spawn_response_timer(&self, token: ResponseToken) -> AbortHandle {
        let weak = Arc::downgrade(&self.shared);
        spawn_timer(self.shared.config.response_timeout, move || {
            let weak = Weak::clone(&weak);
            async move {
                let Some(shared) = weak.upgrade() else {
                    return TimerCheck::Done;
                };
                let mut state = shared.state.lock().await;
                state.responses.on_timer(token)
            }
        })
    }

    /// Send the stored packet of `reservation` again after the queue-full
    /// back-off, unless the reservation ended in the meantime.
    fn schedule_retransmit(&self, reservation: Reservation) {
        let weak = Arc::downgrade(&self.shared);
        let delay = self.shared.config.queue_full_retry_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };

            let packet = {
                let state = shared.state.lock().await;
                match state.acks.packet(reservation) {
                    Some(packet) if !state.closed => packet.to_vec(),
                    _ => return,
                }
            };

            debug!(seq = reservation.sequence_number, "retransmitting after queue full");
            let connection = ZipConnection { shared };
            // a failed resend is left to the ACK deadline
            let _ = connection.send_datagram(&packet).await;
        });
    }
}

/// Pause before receiving again after a transient socket error.
const RECV_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Errors after which the socket can still deliver datagrams.
///
/// ICMP port-unreachable from an earlier send surfaces as a refused or reset
/// connection on the next receive.
fn is_transient_recv_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

fn settle_ack(outcome: Result<AckOutcome, oneshot::error::RecvError>) -> ZipResult<()> {
    match outcome {
        Ok(AckOutcome::Acked) => Ok(()),
        Ok(AckOutcome::Rejected) => Err(ZipError::Nak),
        Ok(AckOutcome::TimedOut) => Err(ZipError::Timeout),
        Ok(AckOutcome::Closed) | Err(_) => Err(ZipError::Closed),
    }
}

fn settle_response(
    outcome: Result<ResponseOutcome, oneshot::error::RecvError>,
) -> ZipResult<Response> {
    match outcome {
        Ok(ResponseOutcome::Received(response)) => Ok(response),
        Ok(ResponseOutcome::TimedOut) => Err(ZipError::Timeout),
        Ok(ResponseOutcome::Closed) | Err(_) => Err(ZipError::Closed),
    }
}
