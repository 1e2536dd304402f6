//! Readiness-driven connection handlers.
//!
//! An external reactor owns the sockets and the event loop. It calls the
//! handlers here with the connection and its [`Selector`] whenever a key is
//! readable or writable.
//!
//! ## Connection Lifecycle
//!
//! 1. **Handshake** - an [`UpgradeSession`] reads the request and writes a
//!    101 or a rejection
//! 2. **Tunnel** - after [`SessionState::Upgraded`], [`pipe_pair`] relays
//!    bytes between the client and the backend
//! 3. **Teardown** - each [`PipeHalf`] cancels its key; closing the socket is
//!    left to the reactor
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsgate::connection::{pipe_pair, Key, SessionState, UpgradeSession};
//!
//! let mut session = UpgradeSession::new(validator, &config);
//! if session.on_readable(&mut client)? == SessionState::Responding {
//!     reactor.set_interest(client_key, session.interest());
//! }
//! // ... once the 101 is written:
//! let (mut client_half, mut server_half) = pipe_pair(client_key, server_key, &config);
//! client_half.inbound().extend_from_slice(session.leftover());
//! ```

mod pipe;
mod reactor;
mod session;
mod state;

pub use pipe::{PipeHalf, SharedBuffer, pipe_pair};
pub use reactor::{Duplex, Interest, Key, Selector, SourceResolver, is_transient};
pub use session::UpgradeSession;
pub use state::{HalfState, SessionState};
