//! Byte relay between two connected peers.
//!
//! Each direction has one fixed-capacity [`SharedBuffer`]. The buffer one half
//! reads into is the buffer its peer drains, so a full buffer stalls reading
//! on one side until the other side catches up. No protocol content is
//! inspected.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use bytes::{Buf, BytesMut};

use super::reactor::{Duplex, Interest, Key, Selector, is_transient};
use super::state::HalfState;
use crate::config::Config;

/// Fixed-capacity byte buffer shared by the two halves of a pipe.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Rc<RefCell<BytesMut>>,
    capacity: usize,
}

impl SharedBuffer {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BytesMut::with_capacity(capacity))),
            capacity,
        }
    }

    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Free space left before the buffer is full.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Append as much of `data` as fits. Returns the number of bytes taken.
    pub fn extend_from_slice(&self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.inner.borrow_mut().extend_from_slice(&data[..n]);
        n
    }

    /// A copy of the buffered bytes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.borrow().to_vec()
    }

    /// Perform one read of at most `chunk` bytes into the free space.
    ///
    /// `Ok(0)` means end-of-stream; callers must not call this on a full
    /// buffer.
    pub fn fill_from<R: Read + ?Sized>(&self, reader: &mut R, chunk: usize) -> io::Result<usize> {
        let want = chunk.min(self.remaining());
        let mut buf = self.inner.borrow_mut();
        let start = buf.len();
        buf.resize(start + want, 0);
        match reader.read(&mut buf[start..]) {
            Ok(n) => {
                buf.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                buf.truncate(start);
                Err(e)
            }
        }
    }

    /// Write buffered bytes until the buffer is empty or the writer would
    /// block. `inspect` sees every chunk that was accepted.
    ///
    /// Returns the number of bytes written. A writer accepting zero bytes of
    /// a non-empty buffer is reported as [`io::ErrorKind::WriteZero`].
    pub fn drain_into<W, F>(&self, writer: &mut W, mut inspect: F) -> io::Result<usize>
    where
        W: Write + ?Sized,
        F: FnMut(&[u8]),
    {
        let mut buf = self.inner.borrow_mut();
        let mut total = 0;
        while !buf.is_empty() {
            match writer.write(&buf[..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    inspect(&buf[..n]);
                    buf.advance(n);
                    total += n;
                }
                Err(e) if is_transient(&e) => break,
                Err(e) => return Err(e),
            }
        }
        if buf.is_empty() {
            buf.clear();
        }
        Ok(total)
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// One direction of a pipe, bound to the key of the connection it reads.
#[derive(Debug)]
pub struct PipeHalf {
    name: &'static str,
    key: Key,
    peer: Key,
    inbound: SharedBuffer,
    outbound: SharedBuffer,
    state: HalfState,
    written: u64,
    transfer_limit: Option<u64>,
    proxy_debug: bool,
    chunk: usize,
}

/// Build the two halves of a pipe between `client` and `server`.
///
/// The client half reads into the buffer the server half drains and the
/// other way round. Both buffers get `config.limits.pipe_buffer_size`.
#[must_use]
pub fn pipe_pair(client: Key, server: Key, config: &Config) -> (PipeHalf, PipeHalf) {
    let upstream = SharedBuffer::with_capacity(config.limits.pipe_buffer_size);
    let downstream = SharedBuffer::with_capacity(config.limits.pipe_buffer_size);

    let client_half = PipeHalf::new(
        "client",
        client,
        server,
        upstream.clone(),
        downstream.clone(),
        config,
    );
    let server_half = PipeHalf::new("server", server, client, downstream, upstream, config);
    (client_half, server_half)
}

impl PipeHalf {
    #[must_use]
    pub fn new(
        name: &'static str,
        key: Key,
        peer: Key,
        inbound: SharedBuffer,
        outbound: SharedBuffer,
        config: &Config,
    ) -> Self {
        Self {
            name,
            key,
            peer,
            inbound,
            outbound,
            state: HalfState::Reading,
            written: 0,
            transfer_limit: config.transfer_limit,
            proxy_debug: config.proxy_debug,
            chunk: config.read_chunk_size.max(1),
        }
    }

    #[must_use]
    #[inline]
    pub fn key(&self) -> Key {
        self.key
    }

    #[must_use]
    #[inline]
    pub fn peer(&self) -> Key {
        self.peer
    }

    #[must_use]
    #[inline]
    pub fn state(&self) -> HalfState {
        self.state
    }

    /// Bytes written to this half's connection so far.
    #[must_use]
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Buffer filled by reading this half's connection.
    #[must_use]
    pub fn inbound(&self) -> &SharedBuffer {
        &self.inbound
    }

    /// Buffer drained into this half's connection.
    #[must_use]
    pub fn outbound(&self) -> &SharedBuffer {
        &self.outbound
    }

    /// Handle a readable event on this half's connection.
    pub fn on_readable<C, S>(&mut self, conn: &mut C, selector: &mut S)
    where
        C: Duplex + ?Sized,
        S: Selector + ?Sized,
    {
        if !self.state.can_read() {
            return;
        }
        if !selector.is_valid(self.peer) {
            tracing::debug!(half = self.name, peer = %self.peer, "peer key invalid");
            self.close(selector);
            return;
        }
        if self.inbound.is_full() {
            self.arm_peer(selector);
            return;
        }

        match self.inbound.fill_from(conn, self.chunk) {
            Ok(0) => {
                tracing::debug!(half = self.name, key = %self.key, "end of stream, half-closing");
                if let Err(e) = conn.shutdown_input() {
                    tracing::debug!(half = self.name, error = %e, "shutdown_input failed");
                }
                selector.set_interest(self.key, Interest::WRITE);
                self.state = HalfState::WritePending;
                self.on_writable(conn, selector);
            }
            Ok(n) => {
                tracing::trace!(half = self.name, bytes = n, "read");
                self.arm_peer(selector);
                self.on_writable(conn, selector);
            }
            Err(e) if is_transient(&e) => {}
            Err(e) => {
                tracing::debug!(half = self.name, error = %e, "read failed");
                self.close(selector);
            }
        }
    }

    /// Handle a writable event on this half's connection.
    pub fn on_writable<C, S>(&mut self, conn: &mut C, selector: &mut S)
    where
        C: Duplex + ?Sized,
        S: Selector + ?Sized,
    {
        if !self.state.is_active() {
            return;
        }

        let name = self.name;
        let proxy_debug = self.proxy_debug;
        let drained = self.outbound.drain_into(conn, |chunk| {
            if proxy_debug {
                tracing::trace!(half = name, data = %String::from_utf8_lossy(chunk), "write");
            }
        });
        match drained {
            Ok(n) => self.written += n as u64,
            Err(e) => {
                tracing::debug!(half = self.name, error = %e, "write failed");
                self.close(selector);
                return;
            }
        }

        if self.transfer_limit.is_some_and(|limit| self.written >= limit) {
            tracing::debug!(half = self.name, written = self.written, "transfer limit reached");
            self.close(selector);
            return;
        }

        match self.state {
            HalfState::WritePending if self.outbound.is_empty() => self.close(selector),
            HalfState::WritePending => selector.set_interest(self.key, Interest::WRITE),
            _ => selector.set_interest(self.key, Interest::READ_WRITE),
        }
    }

    fn arm_peer<S: Selector + ?Sized>(&mut self, selector: &mut S) {
        match selector.interest(self.peer) {
            Some(current) => selector.set_interest(self.peer, current | Interest::WRITE),
            None => self.close(selector),
        }
    }

    fn close<S: Selector + ?Sized>(&mut self, selector: &mut S) {
        selector.cancel(self.key);
        self.state = HalfState::Closed;
    }
}
