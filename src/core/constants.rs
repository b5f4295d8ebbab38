//! Protocol constants for Z/IP sessions.
//!
//! Wire values are fixed by the Z/IP Packet command class and MUST NOT be
//! changed. Timing values are the defaults used by [`SessionConfig`].
//!
//! [`SessionConfig`]: crate::client::SessionConfig

use std::time::Duration;

// =============================================================================
// PORTS
// =============================================================================

/// UDP port for device sessions (DTLS-secured Z/IP).
pub const ZIP_PORT: u16 = 41230;

/// UDP port the gateway listens on for discovery probes.
pub const DISCOVERY_PORT: u16 = 4123;

// =============================================================================
// Z/IP PACKET HEADER
// =============================================================================

/// Command class of the Z/IP wrapper (`COMMAND_CLASS_ZIP`).
pub const ZIP_COMMAND_CLASS: u8 = 0x23;

/// Command of the Z/IP wrapper (`COMMAND_ZIP_PACKET`).
pub const ZIP_PACKET_COMMAND: u8 = 0x02;

/// Minimum size of a wrapped frame (wrapper pair, two flag bytes, sequence
/// number and both endpoints).
pub const ZIP_HEADER_MIN_SIZE: usize = 7;

/// Minimum size of any frame (a command class / command pair).
pub const FRAME_MIN_SIZE: usize = 2;

/// Header size of an encoded request (everything before the command pair).
pub const ZIP_REQUEST_HEADER_SIZE: usize = 10;

/// Total header extension length written on outgoing requests (length byte,
/// option id, option length).
pub const HEADER_EXTENSION_LENGTH: u8 = 3;

// =============================================================================
// HEADER FLAGS
// =============================================================================

/// flags0: the sender requests an ACK.
pub const FLAG0_ACK_REQ: u8 = 0x80;

/// flags0: this frame acknowledges a sequence number.
pub const FLAG0_ACK_RES: u8 = 0x40;

/// flags0: this frame negatively acknowledges a sequence number.
pub const FLAG0_NACK_RES: u8 = 0x20;

/// flags0: NAK qualifier, the gateway is still working on the request.
pub const FLAG0_WAIT_RES: u8 = 0x10;

/// flags0: NAK qualifier, the gateway queue is full.
pub const FLAG0_NACK_QF: u8 = 0x08;

/// flags1: a header extension follows the endpoints.
pub const FLAG1_HDR_EXT_INCL: u8 = 0x80;

/// flags1: a Z-Wave command follows the header.
pub const FLAG1_ZW_CMD_INCL: u8 = 0x40;

/// flags1: more information is pending at the gateway.
pub const FLAG1_MORE_INFORMATION: u8 = 0x20;

/// flags1: the command arrived over a secure channel.
pub const FLAG1_SECURE_ORIGIN: u8 = 0x10;

// =============================================================================
// HEADER EXTENSION OPTIONS
// =============================================================================

/// Expected delay option.
pub const ZIP_OPTION_EXPECTED_DELAY: u8 = 1;

/// Maintenance get option (requests an IMA report).
pub const ZIP_OPTION_MAINTENANCE_GET: u8 = 2;

/// Maintenance report option.
pub const ZIP_OPTION_MAINTENANCE_REPORT: u8 = 3;

// =============================================================================
// TIMING
// =============================================================================

/// Time allowed for the gateway to ACK a request.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(300);

/// Time allowed for a response once the request has been acknowledged.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Deadline extension after a NAK with the queue-full qualifier
/// (10 s back-off plus 2 s for the retried ACK).
pub const QUEUE_FULL_EXTENSION: Duration = Duration::from_millis(12000);

/// Back-off before a queue-full request is transmitted again.
pub const QUEUE_FULL_RETRY_DELAY: Duration = Duration::from_millis(10000);

/// Deadline extension after a NAK with the waiting qualifier.
pub const WAITING_EXTENSION: Duration = Duration::from_millis(90000);

// =============================================================================
// SEQUENCE NUMBERS
// =============================================================================

/// Number of distinct 8-bit sequence numbers.
pub const SEQUENCE_SPACE: usize = 256;

// =============================================================================
// NEIGHBOR DISCOVERY (ZipNd)
// =============================================================================

/// Minimum Node Advertisement payload: flags, node id, 16-byte address, home id.
pub const NODE_ADVERTISEMENT_MIN_SIZE: usize = 22;

/// Size of an IPv6 (or IPv4-mapped) address in a Node Advertisement.
pub const IPV6_ADDRESS_SIZE: usize = 16;

/// Size of a Z-Wave home id.
pub const HOME_ID_SIZE: usize = 4;

// =============================================================================
// NETWORK MANAGEMENT PROXY
// =============================================================================

/// Number of bytes in a Node List Report node bitmask (232 nodes).
pub const NODE_LIST_MASK_SIZE: usize = 29;

/// Offset of the node bitmask in a Node List Report payload.
pub const NODE_LIST_MASK_OFFSET: usize = 3;

/// Max-age field for Node Info Cached Get that forbids a cache refresh.
pub const NODE_INFO_NO_REFRESH: u8 = 15;

// =============================================================================
// DISCOVERY
// =============================================================================

/// Delay between unicast discovery probes.
pub const DISCOVERY_PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound of probed host addresses per interface.
pub const DISCOVERY_MAX_PROBES: u32 = 1023;

/// Time to wait for late replies after the last probe.
pub const DISCOVERY_SETTLE_TIME: Duration = Duration::from_secs(1);

/// Minimum size of a discovery reply (header plus report up to the echoed
/// sequence number).
pub const DISCOVERY_REPLY_MIN_SIZE: usize = 15;

/// Offset of the echoed sequence number in a discovery reply.
pub const DISCOVERY_REPLY_SEQUENCE_OFFSET: usize = 14;
