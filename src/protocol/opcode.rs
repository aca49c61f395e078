//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::CodecError;

/// WebSocket frame opcode.
///
/// Every 4-bit value has a variant, so matching on an `OpCode` is exhaustive
/// over everything the wire can carry. Reserved values keep their raw nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Used for fragmented messages after the initial frame.
    Continuation,

    /// Text frame (0x1).
    Text,

    /// Binary frame (0x2).
    Binary,

    /// Reserved non-control frame (0x3-0x7).
    ReservedData(u8),

    /// Close frame (0x8).
    ///
    /// Initiates connection close. May contain status code and reason.
    Close,

    /// Ping frame (0x9).
    ///
    /// Receiver must respond with Pong.
    Ping,

    /// Pong frame (0xA).
    Pong,

    /// Reserved control frame (0xB-0xF).
    ReservedControl(u8),
}

impl OpCode {
    /// Create an `OpCode` from the low nibble of a frame's first byte.
    ///
    /// The upper four bits are ignored.
    #[must_use]
    pub const fn from_nibble(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            n @ 0x3..=0x7 => OpCode::ReservedData(n),
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            n => OpCode::ReservedControl(n),
        }
    }

    /// Create an `OpCode` from a raw value.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidOpcode` if the value does not fit in 4 bits.
    pub const fn from_u8(byte: u8) -> Result<Self, CodecError> {
        if byte > 0x0F {
            return Err(CodecError::InvalidOpcode(byte));
        }
        Ok(Self::from_nibble(byte))
    }

    /// Convert OpCode to raw byte value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::ReservedData(n) | OpCode::ReservedControl(n) => n & 0x0F,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    /// Check if this is a control frame opcode (0x8-0xF).
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x08 != 0
    }

    /// Check if this is a data frame opcode (0x0-0x7).
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        !self.is_control()
    }

    /// Check if this opcode is reserved for future use.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, OpCode::ReservedData(_) | OpCode::ReservedControl(_))
    }

    /// Get human-readable name for this opcode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::ReservedData(_) => "Reserved",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
            OpCode::ReservedControl(_) => "ReservedControl",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_u8(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.as_u8()
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_reserved() {
            write!(f, "{}({:#x})", self.name(), self.as_u8())
        } else {
            write!(f, "{}", self.name())
        }
    }
}
