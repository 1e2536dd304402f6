//! State machines of the connection handlers.

/// State of one directional half of a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HalfState {
    /// Reading from this side and forwarding to the peer.
    #[default]
    Reading,
    /// This side reached end-of-stream; only draining pending output remains.
    WritePending,
    /// The key was cancelled; no further events are handled.
    Closed,
}

impl HalfState {
    /// Check if the half still handles events.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, HalfState::Closed)
    }

    /// Check if reading from this side is allowed.
    #[must_use]
    #[inline]
    pub const fn can_read(&self) -> bool {
        matches!(self, HalfState::Reading)
    }
}

impl std::fmt::Display for HalfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HalfState::Reading => write!(f, "Reading"),
            HalfState::WritePending => write!(f, "WritePending"),
            HalfState::Closed => write!(f, "Closed"),
        }
    }
}

/// State of a client connection before it becomes a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Accumulating the request header block.
    #[default]
    Reading,
    /// A response is queued and being written.
    Responding,
    /// A 101 was fully written; hand the socket to a pipe.
    Upgraded,
    /// A rejection was fully written.
    Rejected,
    /// The peer went away before a response was produced.
    Closed,
}

impl SessionState {
    /// Check if the session is finished with the socket.
    #[must_use]
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Upgraded | SessionState::Rejected | SessionState::Closed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Reading => write!(f, "Reading"),
            SessionState::Responding => write!(f, "Responding"),
            SessionState::Upgraded => write!(f, "Upgraded"),
            SessionState::Rejected => write!(f, "Rejected"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}
