//! Error types for the WebSocket server core.
//!
//! Handshake failures and codec failures are kept apart: the first are
//! answered with an HTTP error response, the second with a close frame.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while negotiating the opening handshake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandshakeError {
    /// The request line is not `GET <path> HTTP/1.1`.
    #[error("invalid WebSocket connection: {0}")]
    MalformedRequestLine(String),

    /// The requested resource is not the one served.
    #[error("invalid application url: {0}")]
    WrongResource(String),

    /// The Origin header is missing or does not match.
    #[error("invalid Origin: {0}")]
    OriginRejected(String),

    /// The Upgrade or Connection header does not request a WebSocket upgrade.
    #[error("not WebSocket: {0}")]
    NotWebSocketUpgrade(String),

    /// The client speaks a protocol version older than 13.
    #[error("lower version: {0}")]
    UnsupportedVersion(String),

    /// No subprotocol offered by the client is served.
    #[error("unsupported protocol: {0}")]
    NoAcceptableSubprotocol(String),

    /// The Sec-WebSocket-Key header is missing.
    #[error("missing Sec-WebSocket-Key")]
    MissingKey,

    /// The request head exceeds the configured maximum.
    #[error("handshake too large: more than {max} bytes")]
    HandshakeTooLarge {
        /// Maximum allowed size.
        max: usize,
    },

    /// A response header value contains CR or LF.
    #[error("invalid header value for {header}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
    },

    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl HandshakeError {
    /// HTTP status code and reason phrase answered for this error.
    #[must_use]
    pub const fn status(&self) -> (u16, &'static str) {
        match self {
            HandshakeError::UnsupportedVersion(_) => (426, "Upgrade Required"),
            _ => (400, "Bad Request"),
        }
    }
}

impl From<std::io::Error> for HandshakeError {
    fn from(err: std::io::Error) -> Self {
        HandshakeError::Io(err.to_string())
    }
}

/// Errors raised while decoding or encoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// Client frame without the mask bit.
    #[error("Client frame must be masked")]
    UnmaskedFrame,

    /// The stream ended before a complete frame was read.
    #[error("Truncated frame: stream ended early")]
    TruncatedFrame,

    /// 64-bit extended length with the most significant bit set.
    #[error("Invalid payload length: {0:#x}")]
    InvalidLength(u64),

    /// Outgoing payload length cannot be represented.
    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(u64),

    /// Reserved bits set without negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Opcode outside the 4-bit range.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Frame sequence or control-frame rules violated.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CodecError {
    /// Close status a server sends in answer to this error.
    ///
    /// Returns `None` when the stream is already unusable and no close frame
    /// can be delivered.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            CodecError::UnmaskedFrame
            | CodecError::ReservedBitsSet
            | CodecError::InvalidOpcode(_)
            | CodecError::ProtocolViolation(_) => Some(CloseCode::ProtocolError),
            CodecError::InvalidLength(_)
            | CodecError::PayloadTooLarge(_)
            | CodecError::MessageTooLarge { .. }
            | CodecError::TooManyFragments { .. } => Some(CloseCode::MessageTooBig),
            CodecError::TruncatedFrame | CodecError::Io(_) => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => CodecError::TruncatedFrame,
            _ => CodecError::Io(err.to_string()),
        }
    }
}

/// Any error produced by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Opening handshake failed.
    #[error("Invalid handshake: {0}")]
    Handshake(#[from] HandshakeError),

    /// Frame decoding or encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Operation not allowed in the current connection state.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Application handler failed to process a message.
    #[error("Handler error: {0}")]
    Handler(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
