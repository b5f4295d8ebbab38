//! # Z/IP Client
//!
//! **Z**-Wave over **IP** client sessions.
//!
//! A Z/IP gateway bridges a Z-Wave mesh to an IP network. This crate talks to
//! the gateway the way a Z/IP client does:
//!
//! - **Sequencing**: every Z/IP Packet carries an 8-bit sequence number that
//!   stays reserved until the gateway answers
//! - **Reliability**: ACK timeouts, NAK rejection, queue-full retransmission
//!   and waiting-state deadline extension
//! - **Correlation**: responses are routed to the request waiting for them
//! - **Discovery**: gateway lookup on the local networks and node inventory
//!
//! ## Feature Flags
//!
//! - `transport` (default): frame codec, timers and the UDP transport
//! - `client` (default): session engine and node inventory
//! - `discovery` (default): gateway discovery over the attached interfaces
//!
//! ## Modules
//!
//! - [`core`]: constants, error types, address rendering and command tables
//!   (always included)
//! - [`transport`]: wire format and datagram transport (requires `transport`)
//! - [`client`]: sessions with a gateway (requires `client`)
//!
//! ## Example Usage
//!
//! ```rust
//! use zwave_ip::prelude::*;
//!
//! let frame = decode(&[0x23, 0x02, 0x40, 0x00, 0x2a, 0x00, 0x00]).unwrap();
//! match frame {
//!     Frame::Wrapped(wrapped) => {
//!         assert!(wrapped.ack_response());
//!         assert_eq!(wrapped.sequence_number, 0x2a);
//!     }
//!     Frame::Raw(_) => unreachable!(),
//! }
//!
//! assert_eq!(command_class::name(0x25), Some("SwitchBinary"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        decode, encode_raw, encode_zip_packet, DatagramTransport, Frame, FrameError,
        PskCredentials, RawFrame, UdpTransport, WrappedFrame,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{
        request_node_list, NodeAddress, NodeInfo, Response, SessionConfig, ZipConnection,
        ZipConnectionBuilder,
    };

    #[cfg(feature = "discovery")]
    pub use crate::client::{discover_gateway, DiscoveryConfig};
}

// Re-export commonly used items at crate root
pub use crate::core::{ZipError, ZipResult};

#[cfg(feature = "transport")]
pub use crate::transport::{DatagramTransport, Frame, PskCredentials, UdpTransport};

#[cfg(feature = "client")]
pub use crate::client::{Response, SessionConfig, ZipConnection, ZipConnectionBuilder};
