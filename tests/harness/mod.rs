//! Test harness for driving handlers over real loopback sockets.
//!
//! There is no OS poller here: [`PollSelector`] only tracks interest, and
//! [`pump`] calls a handler for every bit that is set. Spurious readiness is
//! harmless because the handlers treat would-block as "no progress".

#![allow(dead_code)]

mod logging;
mod selector;
mod socket;

pub use logging::init_tracing;
pub use selector::{PollSelector, pump, pump_until};
pub use socket::{read_available, tcp_pair};
