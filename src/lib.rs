//! # wsgate - Protocol front end for a non-blocking WebSocket gateway
//!
//! `wsgate` turns raw socket bytes into HTTP envelopes, validates the RFC 6455
//! opening handshake and relays bytes between two connections once a tunnel
//! is up. It never owns an event loop: every handler is driven by an external
//! readiness reactor.
//!
//! ## Features
//!
//! - **Incremental parsing** of header blocks that arrive in pieces
//! - **Request/Response views** over one shared, thread-readable envelope
//! - **RFC 6455 handshake** validation and client-side request building
//! - **Backpressure-aware pipe** with fixed-capacity shared buffers
//!
//! ## Quick Start
//!
//! ```rust
//! use wsgate::{Envelope, UpgradeValidator, handshake_interest};
//!
//! let envelope = Envelope::with_interest(handshake_interest());
//! let status = envelope.parse(
//!     b"GET /chat HTTP/1.1\r\n\
//!       Host: example.com\r\n\
//!       Upgrade: websocket\r\n\
//!       Connection: Upgrade\r\n\
//!       Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
//!       Origin: http://example.com\r\n\
//!       Sec-WebSocket-Version: 13\r\n\
//!       \r\n",
//! );
//! assert!(status.is_complete());
//!
//! let validator = UpgradeValidator::new("/chat", "example.com", "chat");
//! let response = validator.respond(&envelope.as_request());
//! assert_eq!(response.status_code(), Some(101));
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;

pub use config::{Config, Limits};
pub use connection::{
    Duplex, HalfState, Interest, Key, PipeHalf, Selector, SessionState, SharedBuffer,
    SourceResolver, UpgradeSession, pipe_pair,
};
pub use error::{Error, Result};
pub use protocol::{
    Envelope, ParseStatus, Rejection, Request, Response, StatusCode, UpgradeValidator,
    ValidationStep, WS_GUID, build_request, derive_accept, handshake_interest, verify_response,
};
