//! Request and response views over a shared [`Envelope`].
//!
//! A view owns nothing but a handle. Setting the path through a [`Request`]
//! is visible through any [`Response`] later built from the same envelope.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use super::envelope::Envelope;
use super::scan::{parse_cookies, scan_all};
use crate::error::{Error, Result};

/// Protocol prefix every HTTP protocol token starts with.
pub const HTTP: &str = "HTTP";

/// Protocol written when the protocol token is unset.
pub const HTTP_1_1: &str = "HTTP/1.1";

/// Status codes this gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatusCode {
    SwitchingProtocols,
    Ok,
    BadRequest,
    Unauthorized,
    NotFound,
    HeaderFieldsTooLarge,
    InternalServerError,
}

impl StatusCode {
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            StatusCode::SwitchingProtocols => 101,
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::NotFound => 404,
            StatusCode::HeaderFieldsTooLarge => 431,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Canonical reason phrase.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::NotFound => "Not Found",
            StatusCode::HeaderFieldsTooLarge => "Request Header Fields Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            101 => Some(StatusCode::SwitchingProtocols),
            200 => Some(StatusCode::Ok),
            400 => Some(StatusCode::BadRequest),
            401 => Some(StatusCode::Unauthorized),
            404 => Some(StatusCode::NotFound),
            431 => Some(StatusCode::HeaderFieldsTooLarge),
            500 => Some(StatusCode::InternalServerError),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Request view: tokens are method, path and protocol.
#[derive(Clone, Debug)]
pub struct Request {
    envelope: Envelope,
}

impl Request {
    /// Wrap `envelope`. A non-empty protocol token that does not start with
    /// `HTTP` is cleared in the shared storage, since it is most likely a
    /// transposed response line.
    #[must_use]
    pub fn from_envelope(envelope: Envelope) -> Self {
        let protocol = envelope.third_token();
        if !protocol.is_empty() && !protocol.starts_with(HTTP) {
            envelope.set_third_token("");
        }
        Self { envelope }
    }

    /// A fresh request on new storage.
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        let envelope = Envelope::new();
        envelope.set_first_token(method);
        envelope.set_second_token(path);
        Self { envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }

    /// Relabel the same storage as a response.
    #[must_use]
    pub fn as_response(&self) -> Response {
        self.envelope.as_response()
    }

    #[must_use]
    pub fn method(&self) -> String {
        self.envelope.first_token()
    }

    pub fn set_method(&self, method: &str) -> &Self {
        self.envelope.set_first_token(method);
        self
    }

    #[must_use]
    pub fn path(&self) -> String {
        self.envelope.second_token()
    }

    pub fn set_path(&self, path: &str) -> &Self {
        self.envelope.set_second_token(path);
        self
    }

    /// Protocol token; empty when unset.
    #[must_use]
    pub fn protocol(&self) -> String {
        self.envelope.third_token()
    }

    pub fn set_protocol(&self, protocol: &str) -> &Self {
        self.envelope.set_third_token(protocol);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.envelope.header(name)
    }

    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        self.envelope.set_header(name, value);
        self
    }

    #[must_use]
    pub fn headers(&self) -> Arc<BTreeMap<String, String>> {
        self.envelope.headers()
    }

    /// Every value of `name` in the raw block, including repeats.
    #[must_use]
    pub fn headers_named(&self, name: &str) -> Option<Vec<String>> {
        let raw = self.envelope.raw_block()?;
        scan_all(&raw, name)
    }

    /// Cookie pairs from every `Cookie` header.
    ///
    /// With a non-empty `keys`, only those cookies are returned and scanning
    /// stops once all of them were found. `None` when no pair was found.
    #[must_use]
    pub fn cookies(&self, keys: &[&str]) -> Option<BTreeMap<String, String>> {
        let values = self.headers_named("Cookie")?;
        parse_cookies(&values, keys)
    }

    /// Value of a single cookie.
    #[must_use]
    pub fn cookie(&self, key: &str) -> Option<String> {
        self.cookies(&[key])?.into_values().next()
    }

    /// Serialize into `buf`. An unset protocol is written as `HTTP/1.1`.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if a header value contains CR or LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        let protocol = self.protocol();
        let protocol = if protocol.is_empty() { HTTP_1_1 } else { protocol.as_str() };
        write_envelope(buf, &self.method(), &self.path(), protocol, &self.headers())
    }

    /// Serialize into a new buffer.
    ///
    /// # Errors
    /// See [`write`](Self::write).
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(256);
        self.write(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let protocol = self.protocol();
        let protocol = if protocol.is_empty() { HTTP_1_1 } else { protocol.as_str() };
        fmt_envelope(f, &self.method(), &self.path(), protocol, &self.headers())
    }
}

/// Response view: tokens are protocol, status code and status text.
#[derive(Clone, Debug)]
pub struct Response {
    envelope: Envelope,
}

impl Response {
    /// Wrap `envelope`, clearing a protocol token that does not start with
    /// `HTTP`.
    ///
    /// The clearing happens in the shared storage: relabeling a parsed
    /// request as a response erases its method for every view of it.
    #[must_use]
    pub fn from_envelope(envelope: Envelope) -> Self {
        let protocol = envelope.first_token();
        if !protocol.is_empty() && !protocol.starts_with(HTTP) {
            envelope.set_first_token("");
        }
        Self { envelope }
    }

    /// A fresh response on new storage carrying `status`.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        let response = Self {
            envelope: Envelope::new(),
        };
        response.set_status(status);
        response
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }

    /// Relabel the same storage as a request.
    #[must_use]
    pub fn as_request(&self) -> Request {
        self.envelope.as_request()
    }

    /// Protocol token; empty when unset.
    #[must_use]
    pub fn protocol(&self) -> String {
        self.envelope.first_token()
    }

    pub fn set_protocol(&self, protocol: &str) -> &Self {
        self.envelope.set_first_token(protocol);
        self
    }

    /// Status code as text, exactly as parsed or set.
    #[must_use]
    pub fn code(&self) -> String {
        self.envelope.second_token()
    }

    pub fn set_code(&self, code: &str) -> &Self {
        self.envelope.set_second_token(code);
        self
    }

    /// Numeric status code, if the code token parses.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.code().parse().ok()
    }

    #[must_use]
    pub fn status_text(&self) -> String {
        self.envelope.third_token()
    }

    pub fn set_status_text(&self, text: &str) -> &Self {
        self.envelope.set_third_token(text);
        self
    }

    /// Set code and reason phrase together.
    pub fn set_status(&self, status: StatusCode) -> &Self {
        self.set_code(&status.code().to_string());
        self.set_status_text(status.reason())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.envelope.header(name)
    }

    pub fn set_header(&self, name: &str, value: &str) -> &Self {
        self.envelope.set_header(name, value);
        self
    }

    #[must_use]
    pub fn headers(&self) -> Arc<BTreeMap<String, String>> {
        self.envelope.headers()
    }

    /// Every value of `name` in the raw block, including repeats.
    #[must_use]
    pub fn headers_named(&self, name: &str) -> Option<Vec<String>> {
        let raw = self.envelope.raw_block()?;
        scan_all(&raw, name)
    }

    /// Serialize into `buf`. An unset protocol is written as `HTTP/1.1`.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if a header value contains CR or LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        let protocol = self.protocol();
        let protocol = if protocol.is_empty() { HTTP_1_1 } else { protocol.as_str() };
        write_envelope(buf, protocol, &self.code(), &self.status_text(), &self.headers())
    }

    /// Serialize into a new buffer.
    ///
    /// # Errors
    /// See [`write`](Self::write).
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(256);
        self.write(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let protocol = self.protocol();
        let protocol = if protocol.is_empty() { HTTP_1_1 } else { protocol.as_str() };
        fmt_envelope(f, protocol, &self.code(), &self.status_text(), &self.headers())
    }
}

/// Validate that a value does not contain CR or LF characters.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Validate that a header name is a non-empty token: no CR, LF, colon or
/// whitespace.
fn validate_header_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(|c: char| c == ':' || c.is_ascii_whitespace()) {
        return Err(Error::InvalidHeaderValue {
            header: name.to_string(),
            reason: "header name must be a non-empty token without ':' or whitespace"
                .to_string(),
        });
    }
    Ok(())
}

fn write_envelope(
    buf: &mut Vec<u8>,
    t1: &str,
    t2: &str,
    t3: &str,
    headers: &BTreeMap<String, String>,
) -> Result<()> {
    for token in [t1, t2, t3] {
        validate_header_value("start line", token)?;
    }
    buf.extend_from_slice(format!("{t1} {t2} {t3}\r\n").as_bytes());
    for (name, value) in headers {
        validate_header_name(name)?;
        validate_header_value(name, value)?;
        buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    buf.extend_from_slice(b"\r\n");
    Ok(())
}

fn fmt_envelope(
    f: &mut std::fmt::Formatter<'_>,
    t1: &str,
    t2: &str,
    t3: &str,
    headers: &BTreeMap<String, String>,
) -> std::fmt::Result {
    write!(f, "{t1} {t2} {t3}\r\n")?;
    for (name, value) in headers {
        write!(f, "{name}: {value}\r\n")?;
    }
    f.write_str("\r\n")
}
