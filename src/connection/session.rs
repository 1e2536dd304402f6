//! Per-connection handler that precedes a pipe: read the upgrade request,
//! answer it, and report whether the socket may become a tunnel.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};

use super::reactor::{Interest, Key, SourceResolver, is_transient};
use super::state::SessionState;
use crate::config::{Config, Limits};
use crate::error::{Error, Result};
use crate::protocol::{
    Envelope, ParseStatus, Request, Response, StatusCode, UpgradeValidator, handshake_interest,
};

/// Server side of one WebSocket opening handshake.
#[derive(Debug)]
pub struct UpgradeSession {
    envelope: Envelope,
    validator: UpgradeValidator,
    buffer: BytesMut,
    pending: Bytes,
    offset: usize,
    accepted: bool,
    state: SessionState,
    limits: Limits,
    chunk: usize,
}

impl UpgradeSession {
    #[must_use]
    pub fn new(validator: UpgradeValidator, config: &Config) -> Self {
        Self {
            envelope: Envelope::with_interest(handshake_interest()),
            validator,
            buffer: BytesMut::with_capacity(config.read_chunk_size),
            pending: Bytes::new(),
            offset: 0,
            accepted: false,
            state: SessionState::Reading,
            limits: config.limits.clone(),
            chunk: config.read_chunk_size.max(1),
        }
    }

    /// Record the connection identity on the request envelope.
    #[must_use]
    pub fn with_connection<R: SourceResolver + ?Sized>(self, key: Key, resolver: &R) -> Self {
        self.envelope.bind_connection(key, resolver);
        self
    }

    #[must_use]
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Interest the reactor should hold for this connection.
    #[must_use]
    pub fn interest(&self) -> Interest {
        match self.state {
            SessionState::Reading => Interest::READ,
            SessionState::Responding => Interest::WRITE,
            _ => Interest::NONE,
        }
    }

    /// The request as parsed so far.
    #[must_use]
    pub fn request(&self) -> Request {
        self.envelope.as_request()
    }

    /// Bytes the client sent after the header block. Only meaningful once
    /// the request is complete; these belong to the tunnel.
    #[must_use]
    pub fn leftover(&self) -> &[u8] {
        match self.envelope.block_len() {
            Some(end) if end <= self.buffer.len() => &self.buffer[end..],
            _ => &[],
        }
    }

    /// Handle a readable event.
    ///
    /// A would-block read leaves the state unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the read fails, or
    /// [`Error::InvalidHeaderValue`] if the response cannot be serialized.
    /// Either way the session is then [`SessionState::Closed`].
    pub fn on_readable<C: Read + ?Sized>(&mut self, conn: &mut C) -> Result<SessionState> {
        if self.state != SessionState::Reading {
            return Ok(self.state);
        }

        let start = self.buffer.len();
        self.buffer.resize(start + self.chunk, 0);
        let read = conn.read(&mut self.buffer[start..]);
        let n = match read {
            Ok(n) => n,
            Err(e) if is_transient(&e) => {
                self.buffer.truncate(start);
                return Ok(self.state);
            }
            Err(e) => {
                self.buffer.truncate(start);
                self.state = SessionState::Closed;
                return Err(e.into());
            }
        };
        self.buffer.truncate(start + n);

        if n == 0 {
            tracing::debug!(buffered = start, "peer closed before request completed");
            self.state = SessionState::Closed;
            return Ok(self.state);
        }

        match self.envelope.parse(&self.buffer) {
            ParseStatus::Incomplete => {
                if let Err(e) = self.limits.check_header_size(self.buffer.len()) {
                    self.reject_oversized(&e)?;
                }
            }
            ParseStatus::Complete => {
                let size = self.envelope.block_len().unwrap_or(self.buffer.len());
                if let Err(e) = self.limits.check_header_size(size) {
                    self.reject_oversized(&e)?;
                } else {
                    let response = self.validator.respond(&self.request());
                    self.queue(response)?;
                }
            }
        }
        Ok(self.state)
    }

    /// Handle a writable event by draining the queued response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails; the session is then
    /// [`SessionState::Closed`].
    pub fn on_writable<C: Write + ?Sized>(&mut self, conn: &mut C) -> Result<SessionState> {
        if self.state != SessionState::Responding {
            return Ok(self.state);
        }

        while self.offset < self.pending.len() {
            match conn.write(&self.pending[self.offset..]) {
                Ok(0) => {
                    self.state = SessionState::Closed;
                    return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                }
                Ok(n) => self.offset += n,
                Err(e) if is_transient(&e) => return Ok(self.state),
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(e.into());
                }
            }
        }

        self.state = if self.accepted {
            SessionState::Upgraded
        } else {
            SessionState::Rejected
        };
        tracing::debug!(state = %self.state, "handshake response written");
        Ok(self.state)
    }

    fn reject_oversized(&mut self, err: &Error) -> Result<()> {
        tracing::debug!(error = %err, "rejecting request");
        self.queue(Response::new(StatusCode::HeaderFieldsTooLarge))
    }

    fn queue(&mut self, response: Response) -> Result<()> {
        self.pending = match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "response could not be serialized");
                self.state = SessionState::Closed;
                return Err(e);
            }
        };
        self.accepted = response.status_code() == Some(StatusCode::SwitchingProtocols.code());
        self.offset = 0;
        self.state = SessionState::Responding;
        Ok(())
    }
}
