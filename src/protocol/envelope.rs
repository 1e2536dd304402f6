//! Direction-agnostic message envelope.
//!
//! An [`Envelope`] holds the three first-line tokens, the headers named in its
//! interest set and an immutable copy of the raw header block. It is a cheap
//! handle: clones share storage, and the [`Request`](super::Request) and
//! [`Response`](super::Response) views are relabelings of the same handle.
//!
//! Every field lives in its own [`ArcSwap`] cell so another thread can read,
//! say, the source address while the reactor re-parses. Writes are
//! last-write-wins per field and are never merged across fields.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use bytes::Bytes;

use super::cursor::{ByteCursor, LF, SP, locate_double_eol};
use super::index::index_headers;
use super::views::{Request, Response};
use crate::connection::{Key, SourceResolver};

/// Outcome of [`Envelope::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    /// The header block is fully buffered and the envelope is populated.
    Complete,
    /// The blank line ending the header block has not arrived yet.
    Incomplete,
}

impl ParseStatus {
    #[must_use]
    #[inline]
    pub const fn is_complete(&self) -> bool {
        matches!(self, ParseStatus::Complete)
    }
}

/// Sorted snapshot of the header names an envelope extracts on parse.
pub type InterestSet = BTreeSet<String>;

struct Shared {
    first: ArcSwap<String>,
    second: ArcSwap<String>,
    third: ArcSwap<String>,
    headers: ArcSwap<BTreeMap<String, String>>,
    interest: ArcSwap<InterestSet>,
    raw: ArcSwapOption<Bytes>,
    body_offset: ArcSwap<usize>,
    source: ArcSwapOption<SocketAddr>,
    handle: ArcSwapOption<Key>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            first: ArcSwap::from_pointee(String::new()),
            second: ArcSwap::from_pointee(String::new()),
            third: ArcSwap::from_pointee(String::new()),
            headers: ArcSwap::from_pointee(BTreeMap::new()),
            interest: ArcSwap::from_pointee(InterestSet::new()),
            raw: ArcSwapOption::empty(),
            body_offset: ArcSwap::from_pointee(0),
            source: ArcSwapOption::empty(),
            handle: ArcSwapOption::empty(),
        }
    }
}

/// Parsed status line plus selectively extracted headers of one message.
#[derive(Clone, Default)]
pub struct Envelope {
    shared: Arc<Shared>,
}

impl Envelope {
    /// Create an empty envelope with no header interest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty envelope that will extract `names` on parse.
    #[must_use]
    pub fn with_interest<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let envelope = Self::new();
        envelope.add_interest(names);
        envelope
    }

    /// Parse `buf`, which must start at the first byte of a message.
    ///
    /// Tokens are refreshed on every call. Headers and the raw block are only
    /// published once the terminating blank line is present; until then the
    /// raw block is cleared and [`ParseStatus::Incomplete`] is returned so the
    /// caller can read more bytes and parse again.
    pub fn parse(&self, buf: &[u8]) -> ParseStatus {
        self.parse_with(buf, Bytes::copy_from_slice)
    }

    /// Like [`parse`](Self::parse) but the raw block is a zero-copy slice of
    /// `buf`.
    pub fn parse_bytes(&self, buf: &Bytes) -> ParseStatus {
        self.parse_with(buf, |block| buf.slice_ref(block))
    }

    fn parse_with<'a>(&self, buf: &'a [u8], publish: impl FnOnce(&'a [u8]) -> Bytes) -> ParseStatus {
        let mut cursor = ByteCursor::new(buf);
        let line = cursor.peek_until(|b| b == LF);
        let (first, second, third) = split_first_line(line);
        self.shared.first.store(Arc::new(first));
        self.shared.second.store(Arc::new(second));
        self.shared.third.store(Arc::new(third));

        cursor.skip_past(LF);
        let line_two = cursor.position();
        if !locate_double_eol(&mut cursor) {
            self.shared.raw.store(None);
            return ParseStatus::Incomplete;
        }

        let end = cursor.position();
        let raw = publish(&buf[..end]);
        let interest = self.shared.interest.load_full();

        let mut headers = BTreeMap::new();
        if !interest.is_empty() {
            let block = &raw[line_two..];
            let index = index_headers(block);
            for name in interest.iter() {
                if let Some(range) = index.get(name.as_bytes()) {
                    let value = String::from_utf8_lossy(&block[range.clone()]);
                    headers.insert(name.clone(), value.trim().to_string());
                }
            }
        }

        self.shared.headers.store(Arc::new(headers));
        self.shared.body_offset.store(Arc::new(line_two));
        self.shared.raw.store(Some(Arc::new(raw)));
        ParseStatus::Complete
    }

    /// Relabel as a request. See [`Request::from_envelope`].
    #[must_use]
    pub fn as_request(&self) -> Request {
        Request::from_envelope(self.clone())
    }

    /// Relabel as a response. See [`Response::from_envelope`].
    #[must_use]
    pub fn as_response(&self) -> Response {
        Response::from_envelope(self.clone())
    }

    /// Whether `other` is a handle to the same storage.
    #[must_use]
    pub fn same_storage(&self, other: &Envelope) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// First first-line token: method or protocol.
    #[must_use]
    pub fn first_token(&self) -> String {
        self.shared.first.load().as_ref().clone()
    }

    /// Second first-line token: path or status code.
    #[must_use]
    pub fn second_token(&self) -> String {
        self.shared.second.load().as_ref().clone()
    }

    /// Third first-line token: protocol or status text.
    #[must_use]
    pub fn third_token(&self) -> String {
        self.shared.third.load().as_ref().clone()
    }

    pub fn set_first_token(&self, value: impl Into<String>) {
        self.shared.first.store(Arc::new(value.into()));
    }

    pub fn set_second_token(&self, value: impl Into<String>) {
        self.shared.second.store(Arc::new(value.into()));
    }

    pub fn set_third_token(&self, value: impl Into<String>) {
        self.shared.third.store(Arc::new(value.into()));
    }

    /// Snapshot of the extracted headers.
    #[must_use]
    pub fn headers(&self) -> Arc<BTreeMap<String, String>> {
        self.shared.headers.load_full()
    }

    /// Extracted value of `name`, if it was in the interest set and on the wire.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.shared.headers.load().get(name).cloned()
    }

    /// Header value with one pair of surrounding double quotes removed.
    #[must_use]
    pub fn dequoted_header(&self, name: &str) -> Option<String> {
        self.header(name).map(|v| dequote(&v).to_string())
    }

    /// Set a header for serialization. The name joins the interest set.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.add_interest([name.as_str()]);
        let value = value.into();
        self.shared.headers.rcu(|current| {
            let mut next = BTreeMap::clone(current);
            next.insert(name.clone(), value.clone());
            next
        });
    }

    /// Number of extracted headers.
    #[must_use]
    pub fn header_count(&self) -> usize {
        self.shared.headers.load().len()
    }

    /// Current interest snapshot.
    #[must_use]
    pub fn interest(&self) -> Arc<InterestSet> {
        self.shared.interest.load_full()
    }

    /// Union `names` into the interest set and publish the new snapshot.
    /// Names are never removed this way.
    pub fn add_interest<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<String> = names.into_iter().map(Into::into).collect();
        if added.is_empty() {
            return;
        }
        self.shared.interest.rcu(|current| {
            let mut next = InterestSet::clone(current);
            next.extend(added.iter().cloned());
            next
        });
    }

    /// Replace the interest set. Extracted headers whose names are no longer
    /// of interest are dropped.
    pub fn replace_interest<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: InterestSet = names.into_iter().map(Into::into).collect();
        self.shared.headers.rcu(|current| {
            current
                .iter()
                .filter(|(k, _)| next.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>()
        });
        self.shared.interest.store(Arc::new(next));
    }

    /// The exact bytes from the first byte through the blank line, as of the
    /// last complete parse.
    #[must_use]
    pub fn raw_block(&self) -> Option<Bytes> {
        self.shared.raw.load_full().map(|b| Bytes::clone(&b))
    }

    /// Offset of the first header line within [`raw_block`](Self::raw_block).
    #[must_use]
    pub fn header_offset(&self) -> usize {
        **self.shared.body_offset.load()
    }

    /// Length of the raw block, which is where any body bytes begin.
    #[must_use]
    pub fn block_len(&self) -> Option<usize> {
        self.shared.raw.load().as_ref().map(|b| b.len())
    }

    /// Drop everything parsed so far, keeping interest and socket identity.
    pub fn reset(&self) {
        self.shared.first.store(Arc::new(String::new()));
        self.shared.second.store(Arc::new(String::new()));
        self.shared.third.store(Arc::new(String::new()));
        self.shared.headers.store(Arc::new(BTreeMap::new()));
        self.shared.raw.store(None);
        self.shared.body_offset.store(Arc::new(0));
    }

    #[must_use]
    pub fn source_address(&self) -> Option<SocketAddr> {
        self.shared.source.load().as_deref().copied()
    }

    pub fn set_source_address(&self, addr: Option<SocketAddr>) {
        self.shared.source.store(addr.map(Arc::new));
    }

    /// The reactor key of the owning connection.
    #[must_use]
    pub fn connection_handle(&self) -> Option<Key> {
        self.shared.handle.load().as_deref().copied()
    }

    /// Tie the envelope to a connection and record its peer address.
    pub fn bind_connection<R: SourceResolver + ?Sized>(&self, key: Key, resolver: &R) {
        self.shared.handle.store(Some(Arc::new(key)));
        self.set_source_address(resolver.source_address());
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("first", &self.first_token())
            .field("second", &self.second_token())
            .field("third", &self.third_token())
            .field("headers", &self.headers())
            .field("interest", &self.interest())
            .field("source", &self.source_address())
            .field("handle", &self.connection_handle())
            .finish()
    }
}

/// Split a first line into its three fields.
///
/// The first two fields end at a space; the third is the trimmed remainder of
/// the line, so a reason phrase may contain spaces. Missing fields are empty.
fn split_first_line(line: &[u8]) -> (String, String, String) {
    let mut cursor = ByteCursor::new(line);
    let first = decode_trimmed(cursor.take_until(SP));
    let second = decode_trimmed(cursor.take_until(SP));
    let third = decode_trimmed(cursor.rest());
    (first, second, third)
}

fn decode_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Strip one pair of surrounding double quotes.
#[must_use]
pub fn dequote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Split the query part of `path` into key/value pairs.
///
/// Pairs without `=` map to an empty value. A path without `?` has no pairs.
#[must_use]
pub fn parse_query(path: &str) -> BTreeMap<String, String> {
    let Some((_, query)) = path.split_once('?') else {
        return BTreeMap::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
