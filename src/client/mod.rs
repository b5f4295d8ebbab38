//! Z/IP client sessions.
//!
//! - [`ZipConnection`]: sequenced request/response session with one gateway
//! - [`request_node_list`]: node inventory through the gateway
//! - [`discover_gateway`]: gateway discovery on the local networks
//!   (requires the `discovery` feature)
//!
//! The ACK table and the response registry are exposed for callers that
//! drive their own session loop.

mod ack;
mod connection;
#[cfg(feature = "discovery")]
mod discovery;
mod inventory;
mod pending;

pub use ack::*;
pub use connection::*;
#[cfg(feature = "discovery")]
#[cfg_attr(docsrs, doc(cfg(feature = "discovery")))]
pub use discovery::*;
pub use inventory::*;
pub use pending::*;
