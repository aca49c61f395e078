//! Configuration and limits for the WebSocket server core.

use std::time::Duration;

use crate::error::CodecError;

/// Resource limits applied while negotiating and decoding.
///
/// These limits bound the memory a single connection can make the server
/// allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes, after reassembly.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the handshake request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Limits for small embedded systems.
    ///
    /// - Max frame: 64 KB
    /// - Max message: 256 KB
    /// - Max fragments: 16
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }

    /// No limits at all.
    ///
    /// Warning: Use only with trusted peers.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            max_frame_size: usize::MAX,
            max_message_size: usize::MAX,
            max_fragment_count: usize::MAX,
            max_handshake_size: usize::MAX,
        }
    }

    /// Validate that a message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), CodecError> {
        if size > self.max_message_size {
            Err(CodecError::MessageTooLarge {
                size: size as u64,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TooManyFragments`] if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), CodecError> {
        if count > self.max_fragment_count {
            Err(CodecError::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeout configuration for connections.
///
/// The core performs blocking I/O without timers; enforcement belongs to the
/// code that owns the socket (see `TcpStream::set_read_timeout`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time to complete the opening handshake.
    /// Default: 30 seconds
    pub handshake: Duration,

    /// Maximum time to wait for incoming data once open.
    /// Default: 60 seconds
    pub read: Duration,

    /// Maximum time to wait for outgoing data to be sent.
    /// Default: 60 seconds
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
            read: Duration::from_secs(60),
            write: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration, read: Duration, write: Duration) -> Self {
        Self {
            handshake,
            read,
            write,
        }
    }
}

/// What to put in a close frame that has a status but no reason.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CloseReasonPolicy {
    /// Send the 2-byte status alone.
    #[default]
    Omit,
    /// Send this text as reason for every status other than 1000.
    Fill(String),
}

impl CloseReasonPolicy {
    /// Text historically sent for non-normal closes without a reason.
    pub const LEGACY_TEXT: &'static str = "no reason.";

    /// Policy reproducing the legacy `"no reason."` text.
    #[must_use]
    pub fn legacy() -> Self {
        CloseReasonPolicy::Fill(Self::LEGACY_TEXT.to_string())
    }

    /// Resolve the reason to send for `code`.
    #[must_use]
    pub fn resolve<'a>(&'a self, code: u16, reason: Option<&'a str>) -> Option<&'a str> {
        match (reason, self) {
            (Some(reason), _) if !reason.is_empty() => Some(reason),
            (_, CloseReasonPolicy::Fill(text)) if code != 1000 => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Server configuration for one served resource.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource path clients must request, compared exactly.
    ///
    /// Default: "/"
    pub path: String,

    /// Required Origin, compared case-insensitively.
    ///
    /// If `None`, any origin (or no origin) is accepted.
    /// Default: None
    pub origin: Option<String>,

    /// Subprotocols served, in priority order.
    ///
    /// Default: empty (every handshake fails until one is added)
    pub subprotocols: Vec<String>,

    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    ///
    /// If `None`, no timeouts are applied.
    /// Default: None
    pub timeouts: Option<Timeouts>,

    /// Reason text policy for close frames.
    pub close_reason: CloseReasonPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            origin: None,
            subprotocols: Vec::new(),
            limits: Limits::default(),
            timeouts: None,
            close_reason: CloseReasonPolicy::default(),
        }
    }
}

impl Config {
    /// Create a configuration serving `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Require this Origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Append a served subprotocol; earlier ones take priority.
    #[must_use]
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Replace the served subprotocols.
    #[must_use]
    pub fn with_subprotocols<I, P>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.subprotocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Set the close reason policy.
    #[must_use]
    pub fn with_close_reason(mut self, policy: CloseReasonPolicy) -> Self {
        self.close_reason = policy;
        self
    }
}
