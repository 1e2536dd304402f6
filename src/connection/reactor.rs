//! The seam between this crate and an externally owned readiness reactor.
//!
//! Handlers never block and never own the event loop. They receive the
//! connection and a [`Selector`] as arguments, do whatever the currently
//! available bytes allow, and leave interest bits telling the reactor when to
//! call them again.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::ops::{BitOr, BitOrAssign};

/// Opaque registration token of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub usize);

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Readiness a key wants to be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const READ: Interest = Interest(0b01);
    pub const WRITE: Interest = Interest(0b10);
    pub const READ_WRITE: Interest = Interest(0b11);

    #[must_use]
    #[inline]
    pub const fn is_readable(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    #[must_use]
    #[inline]
    pub const fn is_writable(&self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }

    #[must_use]
    #[inline]
    pub const fn add(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }

    #[must_use]
    #[inline]
    pub const fn remove(self, other: Interest) -> Interest {
        Interest(self.0 & !other.0)
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        self.add(rhs)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        *self = self.add(rhs);
    }
}

/// Registration table of the reactor.
///
/// Cancelling a key stops event delivery for it. Closing the socket remains
/// the reactor's job.
pub trait Selector {
    /// Whether `key` is registered and not cancelled.
    fn is_valid(&self, key: Key) -> bool;

    /// Current interest of `key`, `None` if it is not valid.
    fn interest(&self, key: Key) -> Option<Interest>;

    /// Replace the interest of `key`. Ignored for invalid keys.
    fn set_interest(&mut self, key: Key, interest: Interest);

    /// Stop delivering events for `key`.
    fn cancel(&mut self, key: Key);
}

/// A bidirectional byte stream that can close its read side on its own.
pub trait Duplex: Read + Write {
    /// Half-close: no more bytes will be read, writes still go through.
    fn shutdown_input(&mut self) -> io::Result<()>;
}

impl Duplex for TcpStream {
    fn shutdown_input(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Read)
    }
}

#[cfg(unix)]
impl Duplex for std::os::unix::net::UnixStream {
    fn shutdown_input(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Read)
    }
}

/// Resolves the remote address of a connection.
pub trait SourceResolver {
    fn source_address(&self) -> Option<SocketAddr>;
}

impl SourceResolver for TcpStream {
    fn source_address(&self) -> Option<SocketAddr> {
        self.peer_addr().ok()
    }
}

/// `true` for errors that only mean "try again on the next readiness event".
#[must_use]
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_bits() {
        assert!(Interest::READ.is_readable());
        assert!(!Interest::READ.is_writable());
        assert!(Interest::WRITE.is_writable());
        assert_eq!(Interest::READ | Interest::WRITE, Interest::READ_WRITE);
        assert_eq!(Interest::READ_WRITE.remove(Interest::READ), Interest::WRITE);
        assert_eq!(Interest::default(), Interest::NONE);

        let mut interest = Interest::NONE;
        interest |= Interest::WRITE;
        assert_eq!(interest, Interest::WRITE);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key(3).to_string(), "#3");
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }
}
