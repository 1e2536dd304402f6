//! Error types for the gateway protocol front-end.
//!
//! A header block that is not yet fully buffered is not an error; see
//! [`ParseStatus`](crate::protocol::ParseStatus). Socket faults inside the pipe
//! are handled locally as half-close or cancellation and never reach here.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, validating or serializing envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A WebSocket upgrade validation step failed.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A server handshake response failed client-side verification.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Header block exceeds the configured maximum.
    #[error("Header block too large: {size} bytes (max: {max})")]
    HeaderTooLarge {
        /// Buffered size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Header value cannot be put on the wire.
    #[error("Invalid header value for {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was refused.
        reason: String,
    },

    /// The random source could not produce a nonce.
    #[error("Entropy source failed: {0}")]
    Entropy(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<getrandom::Error> for Error {
    fn from(err: getrandom::Error) -> Self {
        Error::Entropy(err.to_string())
    }
}
