//! Bounds-checked scanning over borrowed byte buffers.
//!
//! Nothing here copies: a [`ByteCursor`] is a borrowed slice plus a read
//! offset, and every extraction hands back a sub-slice of the original input.

use std::ops::Range;

/// Carriage return.
pub const CR: u8 = b'\r';
/// Line feed.
pub const LF: u8 = b'\n';
/// Space, the first-line token separator.
pub const SP: u8 = b' ';

/// A read position over an immutable byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the first byte of `buf`.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset.
    #[must_use]
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Move the read offset, clamped to the end of the buffer.
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Reset the read offset to the start of the buffer.
    #[inline]
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Bytes left between the read offset and the end of the buffer.
    #[must_use]
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    #[inline]
    pub const fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// The whole underlying buffer, independent of the read offset.
    #[must_use]
    #[inline]
    pub const fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Unread bytes.
    #[must_use]
    #[inline]
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Absolute byte lookup.
    #[must_use]
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.buf.get(index).copied()
    }

    /// Absolute sub-slice lookup; `None` if the range falls outside the buffer.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Option<&'a [u8]> {
        self.buf.get(range)
    }

    /// Consume and return the next byte.
    pub fn next_byte(&mut self) -> Option<u8> {
        let b = self.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    /// Advance just past the next occurrence of `byte`.
    ///
    /// Returns `false` and leaves the cursor at the end of the buffer when
    /// `byte` does not occur in the unread bytes.
    pub fn skip_past(&mut self, byte: u8) -> bool {
        match self.rest().iter().position(|&b| b == byte) {
            Some(i) => {
                self.pos += i + 1;
                true
            }
            None => {
                self.pos = self.buf.len();
                false
            }
        }
    }

    /// Unread bytes up to, not including, the first byte matching `stop`.
    /// Does not move the cursor.
    #[must_use]
    pub fn peek_until(&self, stop: impl Fn(u8) -> bool) -> &'a [u8] {
        let rest = self.rest();
        let end = rest.iter().position(|&b| stop(b)).unwrap_or(rest.len());
        &rest[..end]
    }

    /// Consume and return the bytes before the next `byte`, also consuming
    /// the delimiter itself when present.
    pub fn take_until(&mut self, byte: u8) -> &'a [u8] {
        let taken = self.peek_until(|b| b == byte);
        self.pos += taken.len();
        if self.has_remaining() {
            self.pos += 1;
        }
        taken
    }
}

/// Scan forward for the blank line that ends a header block.
///
/// The cursor must sit at the start of a header line. Each iteration moves to
/// just past the next LF; the block is complete when that line was exactly
/// `"\r\n"`. A bare `"\n"` line or running out of bytes stops the scan with
/// `false`, which only means more bytes are needed. On success the cursor
/// sits immediately after the terminating blank line.
pub fn locate_double_eol(cursor: &mut ByteCursor<'_>) -> bool {
    let mut eol = cursor.position();
    loop {
        let line_start = eol;
        cursor.skip_past(LF);
        eol = cursor.position();
        let distance = eol - line_start;
        if distance == 2 && cursor.get(eol - 2) == Some(CR) && cursor.get(eol - 1) == Some(LF) {
            return true;
        }
        if !cursor.has_remaining() || distance <= 1 {
            return false;
        }
    }
}

/// Treat an exhausted cursor as reusable by rewinding it instead of
/// reporting end-of-stream.
pub fn avoid_starvation(cursor: &mut ByteCursor<'_>) {
    if !cursor.has_remaining() {
        cursor.rewind();
    }
}

/// Check whether `terminator` is the exact tail of `previous` (most recent
/// first, in reverse) followed by `current`, without joining the chunks.
///
/// Bytes are compared right to left. When `current` runs out the comparison
/// continues at the end of `previous[0]`, then `previous[1]`, and so on.
/// Running out of chunks before the whole terminator matched is a mismatch.
#[must_use]
pub fn suffix_match(terminator: &[u8], current: &[u8], previous: &[&[u8]]) -> bool {
    let mut chunks = previous.iter();
    let mut chunk = current;
    let mut end = chunk.len();

    for &expected in terminator.iter().rev() {
        while end == 0 {
            match chunks.next() {
                Some(prev) => {
                    chunk = prev;
                    end = prev.len();
                }
                None => return false,
            }
        }
        end -= 1;
        if chunk[end] != expected {
            return false;
        }
    }
    true
}
