//! Server side of the WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! The request is consumed line by line through a [`SessionBuilder`], which
//! validates every header as it arrives. Whatever the outcome, exactly one
//! HTTP response is written back: `101 Switching Protocols` on success, a
//! small plain-text error response otherwise.

use std::io::{BufRead, Read, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tracing::{debug, instrument, warn};

use crate::config::{Config, Limits};
use crate::error::HandshakeError;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Lowest accepted `Sec-WebSocket-Version`.
pub const MIN_VERSION: u32 = 13;

type Result<T> = std::result::Result<T, HandshakeError>;

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsrv::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Negotiated state of one connection.
///
/// Only a [`SessionBuilder`] creates sessions; they are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    path: String,
    protocol: String,
    required_origin: Option<String>,
    offered_protocols: Vec<String>,
    client_origin: Option<String>,
    key: String,
}

impl Session {
    /// The resource path the client requested.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The subprotocol selected for this connection.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The Origin the server required, if any.
    #[must_use]
    pub fn required_origin(&self) -> Option<&str> {
        self.required_origin.as_deref()
    }

    /// Subprotocols the client offered, in the client's order.
    #[must_use]
    pub fn offered_protocols(&self) -> &[String] {
        &self.offered_protocols
    }

    /// The Origin the client sent, if any.
    #[must_use]
    pub fn client_origin(&self) -> Option<&str> {
        self.client_origin.as_deref()
    }

    /// The client's Sec-WebSocket-Key, verbatim.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The Sec-WebSocket-Accept value answering this session's key.
    #[must_use]
    pub fn accept_key(&self) -> String {
        compute_accept_key(&self.key)
    }
}

/// Builds a [`Session`] from the lines of a client's upgrade request.
#[derive(Debug)]
pub struct SessionBuilder<'a> {
    expected_path: &'a str,
    expected_origin: Option<&'a str>,
    path: Option<String>,
    key: Option<String>,
    client_origin: Option<String>,
    offered_protocols: Vec<String>,
    upgrade: bool,
    connection: bool,
    version: Option<u32>,
}

impl<'a> SessionBuilder<'a> {
    /// Start negotiating a session for `expected_path`, optionally requiring
    /// `expected_origin`.
    #[must_use]
    pub fn new(expected_path: &'a str, expected_origin: Option<&'a str>) -> Self {
        Self {
            expected_path,
            expected_origin,
            path: None,
            key: None,
            client_origin: None,
            offered_protocols: Vec::new(),
            upgrade: false,
            connection: false,
            version: None,
        }
    }

    /// Feed the request line, `GET <path> HTTP/1.1`.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::MalformedRequestLine` if the line has another shape
    /// - `HandshakeError::WrongResource` if the path is not the expected one
    pub fn request_line(&mut self, line: &str) -> Result<()> {
        let mut parts = line.split_whitespace();
        let path = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("GET"), Some(path), Some("HTTP/1.1"), None) if path.starts_with('/') => path,
            _ => return Err(HandshakeError::MalformedRequestLine(line.to_string())),
        };

        if path != self.expected_path {
            return Err(HandshakeError::WrongResource(path.to_string()));
        }
        self.path = Some(path.to_string());
        Ok(())
    }

    /// Feed one `Key: Value` header line. Unknown headers are ignored.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::OriginRejected` on an Origin mismatch
    /// - `HandshakeError::NotWebSocketUpgrade` on a bad Upgrade or Connection header
    /// - `HandshakeError::UnsupportedVersion` on a version below 13
    pub fn header_line(&mut self, line: &str) -> Result<()> {
        let Some((name, value)) = line.split_once(':') else {
            return Ok(());
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("Origin") {
            if let Some(expected) = self.expected_origin {
                if !value.eq_ignore_ascii_case(expected) {
                    return Err(HandshakeError::OriginRejected(value.to_string()));
                }
            }
            self.client_origin = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("Upgrade") {
            if !value.eq_ignore_ascii_case("websocket") {
                return Err(HandshakeError::NotWebSocketUpgrade(value.to_string()));
            }
            self.upgrade = true;
        } else if name.eq_ignore_ascii_case("Connection") {
            let upgrade = value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("Upgrade"));
            if !upgrade {
                return Err(HandshakeError::NotWebSocketUpgrade(format!(
                    "failed connection type: {value}"
                )));
            }
            self.connection = true;
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Version") {
            match value.parse::<u32>() {
                Ok(version) if version >= MIN_VERSION => self.version = Some(version),
                _ => return Err(HandshakeError::UnsupportedVersion(value.to_string())),
            }
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Key") {
            self.key = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Protocol") {
            self.offered_protocols.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(())
    }

    /// Finish the request and select a subprotocol.
    ///
    /// `supported` lists the subprotocols the server serves, in priority
    /// order; the first one the client also offered wins.
    ///
    /// # Errors
    ///
    /// - `HandshakeError::MalformedRequestLine` if no request line was fed
    /// - `HandshakeError::NotWebSocketUpgrade` if Upgrade or Connection never appeared
    /// - `HandshakeError::UnsupportedVersion` if Sec-WebSocket-Version never appeared
    /// - `HandshakeError::MissingKey` if Sec-WebSocket-Key never appeared
    /// - `HandshakeError::OriginRejected` if a required Origin never appeared
    /// - `HandshakeError::NoAcceptableSubprotocol` if no subprotocol matches
    pub fn finish<P: AsRef<str>>(self, supported: &[P]) -> Result<Session> {
        let path = self
            .path
            .ok_or_else(|| HandshakeError::MalformedRequestLine("empty request".into()))?;
        if !self.upgrade {
            return Err(HandshakeError::NotWebSocketUpgrade(
                "missing Upgrade header".into(),
            ));
        }
        if !self.connection {
            return Err(HandshakeError::NotWebSocketUpgrade(
                "missing Connection header".into(),
            ));
        }
        if self.version.is_none() {
            return Err(HandshakeError::UnsupportedVersion(
                "missing Sec-WebSocket-Version".into(),
            ));
        }
        let key = self.key.ok_or(HandshakeError::MissingKey)?;
        if self.expected_origin.is_some() && self.client_origin.is_none() {
            return Err(HandshakeError::OriginRejected("(none)".into()));
        }

        let protocol = supported
            .iter()
            .map(AsRef::as_ref)
            .find(|candidate| self.offered_protocols.iter().any(|p| p == candidate))
            .ok_or_else(|| {
                HandshakeError::NoAcceptableSubprotocol(self.offered_protocols.join(", "))
            })?
            .to_string();

        Ok(Session {
            path,
            protocol,
            required_origin: self.expected_origin.map(str::to_string),
            offered_protocols: self.offered_protocols,
            client_origin: self.client_origin,
            key,
        })
    }
}

/// Validate that a header value does not contain CR or LF characters.
fn validate_header_value(header: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(HandshakeError::InvalidHeaderValue {
            header: header.to_string(),
        });
    }
    Ok(())
}

/// The `101 Switching Protocols` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol.
    pub protocol: String,
}

impl HandshakeResponse {
    /// Build the response accepting `session`.
    #[must_use]
    pub fn for_session(session: &Session) -> Self {
        Self {
            accept: session.accept_key(),
            protocol: session.protocol.clone(),
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `HandshakeError::InvalidHeaderValue` if the protocol contains CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Sec-WebSocket-Protocol", &self.protocol)?;

        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(format!("Sec-WebSocket-Protocol: {}\r\n", self.protocol).as_bytes());
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// A minimal plain-text HTTP error response rejecting a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Status code, 400 or 426.
    pub status: u16,
    /// Reason phrase matching `status`.
    pub reason: &'static str,
    /// Body text.
    pub body: String,
}

impl ErrorResponse {
    /// Write the HTTP response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());
        buf.extend_from_slice(b"Content-Type: text/plain; charset=utf-8\r\n");
        buf.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        buf.extend_from_slice(b"Connection: close\r\n");
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(self.body.as_bytes());
    }
}

impl From<&HandshakeError> for ErrorResponse {
    fn from(err: &HandshakeError) -> Self {
        let (status, reason) = err.status();
        Self {
            status,
            reason,
            body: err.to_string(),
        }
    }
}

/// Outcome of a negotiation together with the bytes to answer it with.
pub(crate) struct Reply {
    pub(crate) bytes: Vec<u8>,
    pub(crate) outcome: Result<Session>,
}

/// Render the single HTTP response owed for `outcome`.
///
/// I/O failures get no response: the stream is unusable.
pub(crate) fn reply(outcome: Result<Session>) -> Reply {
    let mut bytes = Vec::new();
    let outcome = match outcome {
        Ok(session) => match HandshakeResponse::for_session(&session).write(&mut bytes) {
            Ok(()) => {
                debug!(
                    path = session.path(),
                    protocol = session.protocol(),
                    "handshake accepted"
                );
                Ok(session)
            }
            Err(err) => {
                bytes.clear();
                Err(err)
            }
        },
        Err(err) => Err(err),
    };

    if let Err(ref err) = outcome {
        if matches!(err, HandshakeError::Io(_)) {
            debug!(error = %err, "handshake aborted");
        } else {
            warn!(error = %err, status = err.status().0, "handshake rejected");
            ErrorResponse::from(err).write(&mut bytes);
        }
    }

    Reply { bytes, outcome }
}

/// Trim a raw request line, dropping the line terminator.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

/// Read one request line within the remaining byte `budget`.
///
/// Returns `None` at end of stream.
fn read_line<T: BufRead>(stream: &mut T, budget: &mut usize) -> Result<Option<String>> {
    let max = *budget;
    if max == 0 {
        return Err(HandshakeError::HandshakeTooLarge { max });
    }

    let mut raw = Vec::new();
    let n = stream.by_ref().take(max as u64).read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Ok(None);
    }
    if n == max && raw.last() != Some(&b'\n') {
        return Err(HandshakeError::HandshakeTooLarge { max });
    }

    *budget -= n;
    Ok(Some(decode_line(&raw)))
}

fn read_request<'a, T: BufRead>(
    stream: &mut T,
    mut builder: SessionBuilder<'a>,
    max_size: usize,
) -> Result<SessionBuilder<'a>> {
    let mut budget = max_size;
    let too_large = |err| match err {
        HandshakeError::HandshakeTooLarge { .. } => HandshakeError::HandshakeTooLarge { max: max_size },
        other => other,
    };

    let line = read_line(stream, &mut budget)
        .map_err(too_large)?
        .ok_or_else(|| HandshakeError::MalformedRequestLine("empty request".into()))?;
    builder.request_line(&line)?;

    while let Some(line) = read_line(stream, &mut budget).map_err(too_large)? {
        if line.is_empty() {
            break;
        }
        builder.header_line(&line)?;
    }
    Ok(builder)
}

fn drive<T: BufRead + Write, P: AsRef<str>>(
    stream: &mut T,
    builder: SessionBuilder<'_>,
    subprotocols: &[P],
    max_size: usize,
) -> Result<Session> {
    let outcome = read_request(stream, builder, max_size)
        .and_then(|builder| builder.finish(subprotocols));
    let Reply { bytes, outcome } = reply(outcome);

    if !bytes.is_empty() {
        let written = stream.write_all(&bytes).and_then(|()| stream.flush());
        if let Err(err) = written {
            return Err(outcome.err().unwrap_or_else(|| err.into()));
        }
    }
    outcome
}

/// Negotiate the opening handshake on `stream`.
///
/// Reads the client's request, validates it against `expected_path` and
/// `expected_origin`, picks the first of `subprotocols` the client offered
/// and writes exactly one HTTP response. On failure the error response has
/// already been sent and the caller must close the stream.
///
/// The request head is bounded by the default [`Limits::max_handshake_size`].
///
/// # Errors
///
/// Any [`HandshakeError`].
#[instrument(level = "debug", skip_all, fields(path = expected_path))]
pub fn negotiate<T, P>(
    stream: &mut T,
    expected_path: &str,
    expected_origin: Option<&str>,
    subprotocols: &[P],
) -> Result<Session>
where
    T: BufRead + Write,
    P: AsRef<str>,
{
    let builder = SessionBuilder::new(expected_path, expected_origin);
    drive(
        stream,
        builder,
        subprotocols,
        Limits::default().max_handshake_size,
    )
}

/// Negotiate the opening handshake using the paths, origin, subprotocols and
/// limits of `config`.
///
/// # Errors
///
/// Any [`HandshakeError`].
#[instrument(level = "debug", skip_all, fields(path = %config.path))]
pub fn negotiate_with<T: BufRead + Write>(stream: &mut T, config: &Config) -> Result<Session> {
    let builder = SessionBuilder::new(&config.path, config.origin.as_deref());
    drive(
        stream,
        builder,
        &config.subprotocols,
        config.limits.max_handshake_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteStream;
    use std::io::{self, Cursor};

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    #[derive(Debug)]
    struct MockStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockStream {
        fn new(data: &[u8]) -> Self {
            Self {
                read_data: Cursor::new(data.to_vec()),
                write_data: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.read_data.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn request(extra: &str) -> String {
        format!(
            "GET /echo/ HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             {extra}\r\n"
        )
    }

    fn run(data: &str, origin: Option<&str>, served: &[&str]) -> (Result<Session>, String) {
        let mut stream = ByteStream::new(MockStream::new(data.as_bytes()));
        let result = negotiate(&mut stream, "/echo/", origin, served);
        let written = String::from_utf8(stream.get_ref().write_data.clone()).unwrap();
        (result, written)
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(compute_accept_key(KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_negotiate_success() {
        let data = request("Sec-WebSocket-Protocol: chat, echo\r\n");
        let (result, written) = run(&data, None, &["echo"]);

        let session = result.unwrap();
        assert_eq!(session.path(), "/echo/");
        assert_eq!(session.protocol(), "echo");
        assert_eq!(session.offered_protocols(), ["chat", "echo"]);
        assert_eq!(session.key(), KEY);
        assert_eq!(
            written,
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
             Sec-WebSocket-Protocol: echo\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_server_priority_wins() {
        let data = request("Sec-WebSocket-Protocol: chat, echo\r\n");
        let (result, _) = run(&data, None, &["echo", "chat"]);
        assert_eq!(result.unwrap().protocol(), "echo");

        let (result, _) = run(&data, None, &["chat", "echo"]);
        assert_eq!(result.unwrap().protocol(), "chat");
    }

    #[test]
    fn test_protocols_accumulate_across_headers() {
        let data = request("Sec-WebSocket-Protocol: a\r\nSec-WebSocket-Protocol: b , echo\r\n");
        let (result, _) = run(&data, None, &["echo"]);
        assert_eq!(result.unwrap().offered_protocols(), ["a", "b", "echo"]);
    }

    #[test]
    fn test_no_acceptable_subprotocol() {
        let data = request("Sec-WebSocket-Protocol: chat\r\n");
        let (result, written) = run(&data, None, &["echo"]);
        assert!(matches!(
            result,
            Err(HandshakeError::NoAcceptableSubprotocol(_))
        ));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_empty_server_protocol_list() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n");
        let (result, written) = run(&data, None, &[]);
        assert!(matches!(
            result,
            Err(HandshakeError::NoAcceptableSubprotocol(_))
        ));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_malformed_request_line() {
        for line in [
            "POST /echo/ HTTP/1.1",
            "GET /echo/ HTTP/1.0",
            "GET /echo/",
            "GET echo HTTP/1.1",
            "GET /echo/ HTTP/1.1 extra",
        ] {
            let data = format!("{line}\r\n\r\n");
            let (result, written) = run(&data, None, &["echo"]);
            assert!(
                matches!(result, Err(HandshakeError::MalformedRequestLine(_))),
                "{line}"
            );
            assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        }
    }

    #[test]
    fn test_empty_request() {
        let (result, written) = run("", None, &["echo"]);
        assert!(matches!(
            result,
            Err(HandshakeError::MalformedRequestLine(_))
        ));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_wrong_resource() {
        let data = request("").replace("/echo/", "/chat");
        let (result, written) = run(&data, None, &["echo"]);
        assert_eq!(result, Err(HandshakeError::WrongResource("/chat".into())));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(written.ends_with("\r\n\r\ninvalid application url: /chat"));
    }

    #[test]
    fn test_error_response_format() {
        let data = request("").replace("/echo/", "/chat");
        let (_, written) = run(&data, None, &["echo"]);
        let body = "invalid application url: /chat";
        assert_eq!(
            written,
            format!(
                "HTTP/1.1 400 Bad Request\r\n\
                 Content-Type: text/plain; charset=utf-8\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 Sec-WebSocket-Version: 13\r\n\
                 \r\n\
                 {}",
                body.len(),
                body
            )
        );
    }

    #[test]
    fn test_origin_checked_case_insensitively() {
        let data = request("Origin: HTTP://Example.com\r\nSec-WebSocket-Protocol: echo\r\n");
        let (result, _) = run(&data, Some("http://example.com"), &["echo"]);
        let session = result.unwrap();
        assert_eq!(session.required_origin(), Some("http://example.com"));
        assert_eq!(session.client_origin(), Some("HTTP://Example.com"));
    }

    #[test]
    fn test_origin_rejected() {
        let data = request("Origin: http://evil.com\r\nSec-WebSocket-Protocol: echo\r\n");
        let (result, written) = run(&data, Some("http://example.com"), &["echo"]);
        assert_eq!(
            result,
            Err(HandshakeError::OriginRejected("http://evil.com".into()))
        );
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_origin_missing_when_required() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n");
        let (result, _) = run(&data, Some("http://example.com"), &["echo"]);
        assert!(matches!(result, Err(HandshakeError::OriginRejected(_))));
    }

    #[test]
    fn test_any_origin_without_requirement() {
        let data = request("Origin: http://anything.com\r\nSec-WebSocket-Protocol: echo\r\n");
        let (result, _) = run(&data, None, &["echo"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_upgrade_header() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n").replace("Upgrade: websocket\r\n", "");
        let (result, written) = run(&data, None, &["echo"]);
        assert!(matches!(
            result,
            Err(HandshakeError::NotWebSocketUpgrade(_))
        ));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_wrong_upgrade_header() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Upgrade: websocket", "Upgrade: h2c");
        let (result, _) = run(&data, None, &["echo"]);
        assert_eq!(
            result,
            Err(HandshakeError::NotWebSocketUpgrade("h2c".into()))
        );
    }

    #[test]
    fn test_connection_token_list() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Connection: Upgrade", "Connection: keep-alive, upgrade");
        let (result, _) = run(&data, None, &["echo"]);
        assert!(result.is_ok());

        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Connection: Upgrade", "Connection: keep-alive");
        let (result, _) = run(&data, None, &["echo"]);
        assert!(matches!(
            result,
            Err(HandshakeError::NotWebSocketUpgrade(_))
        ));
    }

    #[test]
    fn test_old_version_gets_426() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 8");
        let (result, written) = run(&data, None, &["echo"]);
        assert_eq!(
            result,
            Err(HandshakeError::UnsupportedVersion("8".into()))
        );
        assert!(written.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(written.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[test]
    fn test_missing_version_gets_426() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Sec-WebSocket-Version: 13\r\n", "");
        let (result, written) = run(&data, None, &["echo"]);
        assert!(matches!(result, Err(HandshakeError::UnsupportedVersion(_))));
        assert!(written.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
    }

    #[test]
    fn test_non_numeric_version_gets_426() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: abc");
        let (result, written) = run(&data, None, &["echo"]);
        assert_eq!(
            result,
            Err(HandshakeError::UnsupportedVersion("abc".into()))
        );
        assert!(written.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
    }

    #[test]
    fn test_newer_version_accepted() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 14");
        let (result, _) = run(&data, None, &["echo"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_key() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n")
            .replace(&format!("Sec-WebSocket-Key: {KEY}\r\n"), "");
        let (result, written) = run(&data, None, &["echo"]);
        assert_eq!(result, Err(HandshakeError::MissingKey));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_case_insensitive_header_names() {
        let data = "GET /echo/ HTTP/1.1\r\n\
            UPGRADE: WebSocket\r\n\
            connection: upgrade\r\n\
            SEC-WEBSOCKET-KEY: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            sec-websocket-version: 13\r\n\
            sec-websocket-protocol: echo\r\n\
            \r\n";
        let (result, _) = run(data, None, &["echo"]);
        assert_eq!(result.unwrap().protocol(), "echo");
    }

    #[test]
    fn test_headers_end_at_eof() {
        let data = request("Sec-WebSocket-Protocol: echo\r\n");
        let data = data.trim_end_matches("\r\n").to_string() + "\r\n";
        let (result, _) = run(&data, None, &["echo"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_handshake_too_large() {
        let padding = format!("X-Padding: {}\r\n", "a".repeat(9000));
        let data = request(&padding);
        let (result, written) = run(&data, None, &["echo"]);
        assert_eq!(result, Err(HandshakeError::HandshakeTooLarge { max: 8192 }));
        assert!(written.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_negotiate_with_config() {
        let config = Config::new("/echo/").with_subprotocols(["echo"]);
        let data = request("Sec-WebSocket-Protocol: echo\r\n");
        let mut stream = ByteStream::new(MockStream::new(data.as_bytes()));
        let session = negotiate_with(&mut stream, &config).unwrap();
        assert_eq!(session.protocol(), "echo");
    }

    #[test]
    fn test_pipelined_bytes_stay_buffered() {
        let mut data = request("Sec-WebSocket-Protocol: echo\r\n").into_bytes();
        data.extend_from_slice(&[0x81, 0x80, 1, 2, 3, 4]);
        let mut stream = ByteStream::new(MockStream::new(&data));
        negotiate(&mut stream, "/echo/", None, &["echo"]).unwrap();
        assert_eq!(stream.buffered(), &[0x81, 0x80, 1, 2, 3, 4]);
    }

    #[test]
    fn test_crlf_in_protocol_rejected() {
        let response = HandshakeResponse {
            accept: compute_accept_key(KEY),
            protocol: "chat\r\nX-Injected: evil".to_string(),
        };
        let mut buf = Vec::new();
        let result = response.write(&mut buf);
        assert!(matches!(
            result,
            Err(HandshakeError::InvalidHeaderValue { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_session_builder_direct() {
        let mut builder = SessionBuilder::new("/", None);
        builder.request_line("GET / HTTP/1.1").unwrap();
        for line in [
            "Upgrade: websocket",
            "Connection: Upgrade",
            "Sec-WebSocket-Version: 13",
            "Sec-WebSocket-Key: abc",
            "Sec-WebSocket-Protocol: one, two",
            "not a header",
        ] {
            builder.header_line(line).unwrap();
        }
        let session = builder.finish(&["two", "one"]).unwrap();
        assert_eq!(session.protocol(), "two");
        assert_eq!(session.accept_key(), compute_accept_key("abc"));
    }
}
