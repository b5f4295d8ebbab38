//! Z/IP transport layer.
//!
//! This module provides the pieces a session is built from:
//!
//! - **Frame encoding/decoding**: [`Frame`], [`encode_zip_packet`], [`decode`]
//! - **Deadlines and timers**: [`Deadline`] and [`spawn_timer`]
//! - **Datagram channel**: the [`DatagramTransport`] seam and [`UdpTransport`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Session (ACK table, responses)      │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, deadlines, datagram seam      │
//! ├─────────────────────────────────────────┤
//! │      Secured datagram channel           │
//! └─────────────────────────────────────────┘
//! ```

mod frame;
mod socket;
mod timing;

pub use frame::*;
pub use socket::*;
pub use timing::*;
