//! WebSocket opening handshake (RFC 6455 section 4).
//!
//! Server side: [`UpgradeValidator`] checks a parsed [`Request`] in a fixed
//! order and answers with either a 101 or a 401 naming the first failed step.
//! Client side: [`build_request`] produces a valid upgrade request and
//! [`verify_response`] checks the server's answer.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use super::views::{HTTP_1_1, Request, Response, StatusCode};
use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this gateway speaks.
pub const WS_VERSION: u8 = 13;

/// Fewest extracted headers an upgrade request may carry.
pub const MIN_HANDSHAKE_HEADERS: usize = 6;

pub const HOST: &str = "Host";
pub const ORIGIN: &str = "Origin";
pub const UPGRADE: &str = "Upgrade";
pub const CONNECTION: &str = "Connection";
pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
pub const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";
pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";

/// Header names an upgrade request carries. Use as the interest set of an
/// envelope that will receive one.
#[must_use]
pub const fn handshake_interest() -> [&'static str; 7] {
    [
        CONNECTION,
        HOST,
        ORIGIN,
        SEC_WEBSOCKET_KEY,
        SEC_WEBSOCKET_PROTOCOL,
        SEC_WEBSOCKET_VERSION,
        UPGRADE,
    ]
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The key is hashed exactly as it appeared on the wire, still base64
/// encoded: Base64(SHA-1(key + GUID)).
///
/// # Example
///
/// ```
/// use wsgate::protocol::handshake::derive_accept;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(derive_accept(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn derive_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Validation steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationStep {
    Method,
    Protocol,
    HeaderCount,
    HostAndPath,
    Upgrade,
    Connection,
    Key,
    Version,
}

impl ValidationStep {
    /// Status text sent back when this step fails.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            ValidationStep::Method => "wrong method.",
            ValidationStep::Protocol => "wrong protocol",
            ValidationStep::HeaderCount => "not enough request headers to attempt an upgrade",
            ValidationStep::HostAndPath => {
                "Host and Request-URI must match the host and resource name of the ws URI"
            }
            ValidationStep::Upgrade => "Upgrade header must include the \"websocket\" keyword",
            ValidationStep::Connection => "Connection header must include the \"Upgrade\" token",
            ValidationStep::Key => "Sec-WebSocket-Key must be a base64-encoded 16-byte nonce",
            ValidationStep::Version => "only version 13 of the WebSocket protocol is supported",
        }
    }
}

impl std::fmt::Display for ValidationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// The first validation step an upgrade request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rejection {
    pub step: ValidationStep,
}

impl Rejection {
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        self.step.reason()
    }

    /// A fresh 401 response whose status text is the failed step's reason.
    #[must_use]
    pub fn into_response(self) -> Response {
        let response = Response::new(StatusCode::Unauthorized);
        response.set_status_text(self.reason());
        response
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Error::ProtocolViolation(rejection.reason().to_string())
    }
}

/// Server-side upgrade check for one WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeValidator {
    path: String,
    host: String,
    subprotocol: String,
}

impl UpgradeValidator {
    /// `path` and `host` are prefixes the request's target and `Host` header
    /// must start with; `subprotocol` is echoed unmodified on success.
    #[must_use]
    pub fn new(path: impl Into<String>, host: impl Into<String>, subprotocol: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            subprotocol: subprotocol.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn subprotocol(&self) -> &str {
        &self.subprotocol
    }

    /// Run every step in order and return the key text as received.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] for the first step that failed. An
    /// undecodable key or non-numeric version fails its own step; it is never
    /// a separate error path.
    pub fn check(&self, request: &Request) -> std::result::Result<String, Rejection> {
        let reject = |step| -> std::result::Result<String, Rejection> { Err(Rejection { step }) };

        if request.method() != "GET" {
            return reject(ValidationStep::Method);
        }
        if request.protocol() != HTTP_1_1 {
            return reject(ValidationStep::Protocol);
        }
        if request.headers().len() < MIN_HANDSHAKE_HEADERS {
            return reject(ValidationStep::HeaderCount);
        }

        let host_ok = request
            .header(HOST)
            .is_some_and(|h| !h.is_empty() && h.starts_with(&self.host));
        if !host_ok || !request.path().starts_with(&self.path) {
            return reject(ValidationStep::HostAndPath);
        }

        if !request.header(UPGRADE).is_some_and(|u| u.contains("websocket")) {
            return reject(ValidationStep::Upgrade);
        }
        if !request.header(CONNECTION).is_some_and(|c| c.contains("Upgrade")) {
            return reject(ValidationStep::Connection);
        }

        let Some(key) = request.header(SEC_WEBSOCKET_KEY) else {
            return reject(ValidationStep::Key);
        };
        match BASE64.decode(&key) {
            Ok(nonce) if nonce.len() == 16 => {}
            _ => return reject(ValidationStep::Key),
        }

        let version = request
            .header(SEC_WEBSOCKET_VERSION)
            .and_then(|v| v.parse::<i64>().ok());
        if version != Some(i64::from(WS_VERSION)) {
            return reject(ValidationStep::Version);
        }

        Ok(key)
    }

    /// Validate and build the 101 response.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn accept(&self, request: &Request) -> std::result::Result<Response, Rejection> {
        let key = self.check(request)?;
        let response = Response::new(StatusCode::SwitchingProtocols);
        response
            .set_header(SEC_WEBSOCKET_ACCEPT, &derive_accept(&key))
            .set_header(SEC_WEBSOCKET_PROTOCOL, &self.subprotocol)
            .set_header(UPGRADE, "websocket")
            .set_header(CONNECTION, "Upgrade");
        tracing::debug!(path = %request.path(), "websocket upgrade accepted");
        Ok(response)
    }

    /// Validate and answer with either a 101 or a 401. No 101 is produced
    /// unless every step passed.
    #[must_use]
    pub fn respond(&self, request: &Request) -> Response {
        self.accept(request).unwrap_or_else(|rejection| {
            tracing::debug!(
                path = %request.path(),
                step = ?rejection.step,
                "websocket upgrade rejected"
            );
            rejection.into_response()
        })
    }
}

/// Build a client upgrade request carrying a fresh random nonce.
///
/// The nonce only needs to be uniformly distributed; it is not a secret.
///
/// # Errors
///
/// Returns `Error::Entropy` if the random source fails.
pub fn build_request(path: &str, host: &str, origin: &str, protocol: &str) -> Result<Request> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)?;

    let request = Request::new("GET", path);
    request.envelope().add_interest(handshake_interest());
    request
        .set_header(CONNECTION, "Upgrade")
        .set_header(HOST, host)
        .set_header(ORIGIN, origin)
        .set_header(SEC_WEBSOCKET_KEY, &BASE64.encode(nonce))
        .set_header(SEC_WEBSOCKET_PROTOCOL, protocol)
        .set_header(SEC_WEBSOCKET_VERSION, &WS_VERSION.to_string())
        .set_header(UPGRADE, "websocket");
    Ok(request)
}

/// Verify a server's answer to a request from [`build_request`].
///
/// # Errors
///
/// Returns [`Error::InvalidHandshake`] if:
/// - The request carries no `Sec-WebSocket-Key`.
/// - The status code is not `101`.
/// - The `Sec-WebSocket-Accept` header is missing or does not match the key.
pub fn verify_response(request: &Request, response: &Response) -> Result<()> {
    let key = request
        .header(SEC_WEBSOCKET_KEY)
        .ok_or_else(|| Error::InvalidHandshake("Request has no Sec-WebSocket-Key".into()))?;

    if response.status_code() != Some(StatusCode::SwitchingProtocols.code()) {
        return Err(Error::InvalidHandshake(format!(
            "Expected 101 status, got: {} {}",
            response.code(),
            response.status_text()
        )));
    }

    let accept = response
        .header(SEC_WEBSOCKET_ACCEPT)
        .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into()))?;
    if accept != derive_accept(&key) {
        return Err(Error::InvalidHandshake(format!(
            "Sec-WebSocket-Accept mismatch: {}",
            accept
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Envelope;

    const VALID: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Origin: http://example.com\r\n\
        Sec-WebSocket-Protocol: chat, superchat\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    fn validator() -> UpgradeValidator {
        UpgradeValidator::new("/chat", "server.example.com", "chat")
    }

    fn parse(raw: &[u8]) -> Request {
        let env = Envelope::with_interest(handshake_interest());
        assert!(env.parse(raw).is_complete());
        env.as_request()
    }

    fn replace(raw: &[u8], from: &str, to: &str) -> Vec<u8> {
        String::from_utf8(raw.to_vec())
            .unwrap()
            .replacen(from, to, 1)
            .into_bytes()
    }

    fn rejected_step(raw: &[u8]) -> ValidationStep {
        validator().check(&parse(raw)).unwrap_err().step
    }

    #[test]
    fn test_derive_accept_rfc_example() {
        // RFC 6455 Section 1.3 example
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(derive_accept(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_accept_valid_request() {
        let response = validator().respond(&parse(VALID));
        assert_eq!(response.status_code(), Some(101));
        assert_eq!(response.status_text(), "Switching Protocols");
        assert_eq!(
            response.header(SEC_WEBSOCKET_ACCEPT).as_deref(),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
        assert_eq!(response.header(SEC_WEBSOCKET_PROTOCOL).as_deref(), Some("chat"));
        assert_eq!(response.header(UPGRADE).as_deref(), Some("websocket"));
        assert_eq!(response.header(CONNECTION).as_deref(), Some("Upgrade"));
    }

    #[test]
    fn test_response_write() {
        let response = validator().respond(&parse(VALID));
        let text = String::from_utf8(response.to_bytes().unwrap().to_vec()).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
             Sec-WebSocket-Protocol: chat\r\n\
             Upgrade: websocket\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_wrong_method() {
        let raw = replace(VALID, "GET /chat", "POST /chat");
        assert_eq!(rejected_step(&raw), ValidationStep::Method);
    }

    #[test]
    fn test_wrong_protocol() {
        let raw = replace(VALID, "HTTP/1.1", "HTTP/1.0");
        assert_eq!(rejected_step(&raw), ValidationStep::Protocol);
        // newer is not good enough either
        let raw = replace(VALID, "HTTP/1.1", "HTTP/2.0");
        assert_eq!(rejected_step(&raw), ValidationStep::Protocol);
    }

    #[test]
    fn test_too_few_headers() {
        let raw = b"GET /chat HTTP/1.1\r\n\
            Host: server.example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        assert_eq!(rejected_step(raw), ValidationStep::HeaderCount);
    }

    #[test]
    fn test_host_mismatch() {
        let raw = replace(VALID, "Host: server.example.com", "Host: evil.example.com");
        assert_eq!(rejected_step(&raw), ValidationStep::HostAndPath);
        let raw = replace(VALID, "Host: server.example.com", "Host: ");
        assert_eq!(rejected_step(&raw), ValidationStep::HostAndPath);
    }

    #[test]
    fn test_host_with_port_accepted() {
        let raw = replace(VALID, "Host: server.example.com", "Host: server.example.com:8080");
        assert!(validator().check(&parse(&raw)).is_ok());
    }

    #[test]
    fn test_path_mismatch() {
        let raw = replace(VALID, "GET /chat", "GET /other");
        assert_eq!(rejected_step(&raw), ValidationStep::HostAndPath);
    }

    #[test]
    fn test_upgrade_missing_keyword() {
        let raw = replace(VALID, "Upgrade: websocket", "Upgrade: h2c");
        assert_eq!(rejected_step(&raw), ValidationStep::Upgrade);
    }

    #[test]
    fn test_connection_token_is_case_sensitive() {
        let raw = replace(VALID, "Connection: Upgrade", "Connection: upgrade");
        assert_eq!(rejected_step(&raw), ValidationStep::Connection);
        let raw = replace(VALID, "Connection: Upgrade", "Connection: keep-alive, Upgrade");
        assert!(validator().check(&parse(&raw)).is_ok());
    }

    #[test]
    fn test_bad_key() {
        // "short" - only 5 bytes
        let raw = replace(VALID, "dGhlIHNhbXBsZSBub25jZQ==", "c2hvcnQ=");
        assert_eq!(rejected_step(&raw), ValidationStep::Key);
        let raw = replace(VALID, "dGhlIHNhbXBsZSBub25jZQ==", "not base64!");
        assert_eq!(rejected_step(&raw), ValidationStep::Key);
    }

    #[test]
    fn test_bad_version() {
        let raw = replace(VALID, "Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 12");
        assert_eq!(rejected_step(&raw), ValidationStep::Version);
        let raw = replace(VALID, "Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: thirteen");
        assert_eq!(rejected_step(&raw), ValidationStep::Version);
    }

    #[test]
    fn test_first_failure_wins() {
        let raw = replace(VALID, "GET /chat", "PUT /other");
        let raw = replace(&raw, "Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 8");
        assert_eq!(rejected_step(&raw), ValidationStep::Method);
    }

    #[test]
    fn test_rejection_response() {
        let raw = replace(VALID, "Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 12");
        let response = validator().respond(&parse(&raw));
        assert_eq!(response.status_code(), Some(401));
        assert_eq!(response.status_text(), ValidationStep::Version.reason());
        assert!(response.header(SEC_WEBSOCKET_ACCEPT).is_none());
        let bytes = response.to_bytes().unwrap();
        assert!(bytes.starts_with(b"HTTP/1.1 401 only version 13"));
    }

    #[test]
    fn test_rejection_into_error() {
        let err: Error = Rejection {
            step: ValidationStep::Upgrade,
        }
        .into();
        assert!(matches!(err, Error::ProtocolViolation(msg) if msg.contains("websocket")));
    }

    #[test]
    fn test_build_request() {
        let request = build_request("/chat", "server.example.com", "http://example.com", "chat").unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/chat");
        assert_eq!(request.headers().len(), 7);
        let key = request.header(SEC_WEBSOCKET_KEY).unwrap();
        assert_eq!(BASE64.decode(&key).unwrap().len(), 16);
        assert_eq!(request.header(SEC_WEBSOCKET_VERSION).as_deref(), Some("13"));
    }

    #[test]
    fn test_build_request_reparses_identically() {
        let request =
            build_request("/chat", "server.example.com", "http://example.com", "chat, v2").unwrap();
        let reparsed = parse(&request.to_bytes().unwrap());

        for name in handshake_interest() {
            assert_eq!(reparsed.header(name), request.header(name), "{name}");
        }
        assert_eq!(reparsed.header(ORIGIN).as_deref(), Some("http://example.com"));
        assert_eq!(reparsed.header(SEC_WEBSOCKET_PROTOCOL).as_deref(), Some("chat, v2"));
        assert_eq!(reparsed.protocol(), HTTP_1_1);
    }

    #[test]
    fn test_build_request_fresh_nonce() {
        let a = build_request("/", "h", "o", "p").unwrap();
        let b = build_request("/", "h", "o", "p").unwrap();
        assert_ne!(a.header(SEC_WEBSOCKET_KEY), b.header(SEC_WEBSOCKET_KEY));
    }

    #[test]
    fn test_verify_response() {
        let request = build_request("/chat", "server.example.com", "http://example.com", "chat").unwrap();
        let wire = request.to_bytes().unwrap();
        let response = validator().respond(&parse(&wire));
        assert!(verify_response(&request, &response).is_ok());

        response.set_header(SEC_WEBSOCKET_ACCEPT, "bogus");
        assert!(matches!(
            verify_response(&request, &response),
            Err(Error::InvalidHandshake(msg)) if msg.contains("mismatch")
        ));
    }

    #[test]
    fn test_verify_rejected_response() {
        let request = build_request("/chat", "server.example.com", "o", "chat").unwrap();
        let response = Rejection {
            step: ValidationStep::Key,
        }
        .into_response();
        assert!(matches!(
            verify_response(&request, &response),
            Err(Error::InvalidHandshake(msg)) if msg.contains("101")
        ));
    }
}
