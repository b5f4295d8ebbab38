//! Error types for Z/IP sessions.

use thiserror::Error;

/// Errors surfaced to callers of a Z/IP session.
///
/// Inbound traffic never produces one of these: malformed or unsolicited
/// datagrams are dropped at the demultiplexer. Only the request a frame was
/// meant for observes success or failure.
#[derive(Debug, Error)]
pub enum ZipError {
    /// No ACK or response arrived before the deadline.
    #[error("timed out waiting for the gateway")]
    Timeout,

    /// The gateway explicitly rejected the request.
    #[error("request rejected by the gateway (NAK)")]
    Nak,

    /// All 256 sequence numbers have live reservations.
    #[error("no sequence numbers available")]
    SequenceExhausted,

    /// A public entry point was called with an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session was closed while the request was outstanding.
    #[error("session closed")]
    Closed,

    /// Discovery finished without any gateway replying.
    #[error("no Z/IP gateway found")]
    GatewayNotFound,

    /// A matched response did not have the expected layout.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZipError {
    /// Check if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ZipError::Timeout | ZipError::SequenceExhausted)
    }
}

/// Result type for Z/IP operations.
pub type ZipResult<T> = Result<T, ZipError>;
