//! WebSocket frame parsing and serialization (RFC 6455 Section 5.2).
//!
//! Frames are read either straight from a blocking [`Read`] (one header field
//! at a time) or from an in-memory buffer for the async codec. Frames written
//! by the server are never masked.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Payload of the server's keepalive ping.
pub const PING_PAYLOAD: &[u8] = b"PING";

type Result<T> = std::result::Result<T, CodecError>;

/// Decoded frame header.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                     Masking key (if present)                  |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1-3 as the low three bits.
    pub rsv: u8,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present on client frames.
    pub mask: Option<[u8; 4]>,
    /// Payload length in bytes.
    pub payload_len: u64,
}

/// Fields carried by the first two header bytes.
struct Leading {
    fin: bool,
    rsv: u8,
    opcode: OpCode,
    len7: u8,
}

/// Decode and check the two fixed header bytes.
///
/// Masking is checked first: a server never accepts an unmasked frame.
fn parse_leading(byte0: u8, byte1: u8) -> Result<Leading> {
    if byte1 & 0x80 == 0 {
        return Err(CodecError::UnmaskedFrame);
    }

    let leading = Leading {
        fin: byte0 & 0x80 != 0,
        rsv: (byte0 >> 4) & 0x07,
        opcode: OpCode::from_nibble(byte0),
        len7: byte1 & 0x7F,
    };

    if leading.rsv != 0 {
        return Err(CodecError::ReservedBitsSet);
    }

    if leading.opcode.is_control() {
        if !leading.fin {
            return Err(CodecError::ProtocolViolation(
                "Control frames cannot be fragmented".into(),
            ));
        }
        if usize::from(leading.len7) > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(CodecError::ProtocolViolation(format!(
                "Control frame payload too large: {} (max: {})",
                leading.len7, MAX_CONTROL_FRAME_PAYLOAD
            )));
        }
    }

    Ok(leading)
}

/// Number of extended length bytes following a 7-bit length field.
#[inline]
const fn extended_len_size(len7: u8) -> usize {
    match len7 {
        126 => 2,
        127 => 8,
        _ => 0,
    }
}

/// Resolve the payload length from the 7-bit field and its extension bytes.
fn resolve_len(len7: u8, ext: &[u8]) -> Result<u64> {
    match *ext {
        [] => Ok(u64::from(len7)),
        [a, b] => Ok(u64::from(u16::from_be_bytes([a, b]))),
        [a, b, c, d, e, f, g, h] => {
            let len = u64::from_be_bytes([a, b, c, d, e, f, g, h]);
            if len >> 63 != 0 {
                return Err(CodecError::InvalidLength(len));
            }
            Ok(len)
        }
        _ => Err(CodecError::TruncatedFrame),
    }
}

impl FrameHeader {
    /// Read a client frame header from a blocking stream.
    ///
    /// # Errors
    ///
    /// - `CodecError::UnmaskedFrame` if the mask bit is clear
    /// - `CodecError::ReservedBitsSet` if RSV bits are set
    /// - `CodecError::ProtocolViolation` for fragmented or oversized control frames
    /// - `CodecError::InvalidLength` if the 64-bit length has its top bit set
    /// - `CodecError::TruncatedFrame` if the stream ends mid-header
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 2];
        reader.read_exact(&mut fixed)?;
        let leading = parse_leading(fixed[0], fixed[1])?;

        let mut ext = [0u8; 8];
        let ext = &mut ext[..extended_len_size(leading.len7)];
        reader.read_exact(ext)?;
        let payload_len = resolve_len(leading.len7, ext)?;

        let mut mask = [0u8; 4];
        reader.read_exact(&mut mask)?;

        Ok(Self {
            fin: leading.fin,
            rsv: leading.rsv,
            opcode: leading.opcode,
            mask: Some(mask),
            payload_len,
        })
    }

    /// Parse a client frame header from the start of a buffer.
    ///
    /// Returns `Ok(None)` if the buffer does not yet hold the whole header,
    /// otherwise the header and its length in bytes.
    ///
    /// # Errors
    ///
    /// Same as [`FrameHeader::read_from`], except that a short buffer is not
    /// an error.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let [byte0, byte1, rest @ ..] = buf else {
            return Ok(None);
        };
        let leading = parse_leading(*byte0, *byte1)?;

        let ext_size = extended_len_size(leading.len7);
        let header_len = 2 + ext_size + 4;
        if buf.len() < header_len {
            return Ok(None);
        }

        let payload_len = resolve_len(leading.len7, &rest[..ext_size])?;
        let mut mask = [0u8; 4];
        mask.copy_from_slice(&rest[ext_size..ext_size + 4]);

        Ok(Some((
            Self {
                fin: leading.fin,
                rsv: leading.rsv,
                opcode: leading.opcode,
                mask: Some(mask),
                payload_len,
            },
            header_len,
        )))
    }

    /// Header size on the wire.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let ext = if self.payload_len <= 125 {
            0
        } else if self.payload_len <= 0xFFFF {
            2
        } else {
            8
        };
        let mask = if self.mask.is_some() { 4 } else { 0 };
        2 + ext + mask
    }

    /// Append this header to a buffer.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::PayloadTooLarge` if the payload length has bit 63 set.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let len = self.payload_len;
        if len >> 63 != 0 {
            return Err(CodecError::PayloadTooLarge(len));
        }

        buf.reserve(self.encoded_len());

        let fin = if self.fin { 0x80 } else { 0x00 };
        buf.put_u8(fin | ((self.rsv & 0x07) << 4) | self.opcode.as_u8());

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };
        if len <= 125 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= 0xFFFF {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len);
        }

        if let Some(mask) = self.mask {
            buf.put_slice(&mask);
        }
        Ok(())
    }
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Unmasked payload data.
    payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a close frame.
    ///
    /// Without a reason the payload is just the big-endian status code.
    #[must_use]
    pub fn close(code: CloseCode, reason: Option<&str>) -> Self {
        let frame = CloseFrame::new(code, reason.unwrap_or_default());
        Self::new(true, OpCode::Close, frame.to_payload())
    }

    /// Create the server keepalive ping, carrying `"PING"`.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(true, OpCode::Ping, Bytes::from_static(PING_PAYLOAD))
    }

    /// Create a pong echoing `data`.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Read one masked client frame from a blocking stream and unmask it.
    ///
    /// # Errors
    ///
    /// Header errors as in [`FrameHeader::read_from`], plus
    /// `CodecError::MessageTooLarge` if the payload exceeds `max_payload`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, max_payload: usize) -> Result<Self> {
        let header = FrameHeader::read_from(reader)?;
        let len = check_payload_len(header.payload_len, max_payload)?;

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut data, mask);
        }

        Ok(Self::new(header.fin, header.opcode, data))
    }

    /// Parse one masked client frame from the start of a buffer.
    ///
    /// Returns `Ok(None)` until the buffer holds the whole frame, otherwise
    /// the frame and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Same as [`Frame::read_from`], except that a short buffer is not an error.
    pub fn parse(buf: &[u8], max_payload: usize) -> Result<Option<(Self, usize)>> {
        let Some((header, header_len)) = FrameHeader::parse(buf)? else {
            return Ok(None);
        };
        let len = check_payload_len(header.payload_len, max_payload)?;

        let total = header_len + len;
        if buf.len() < total {
            return Ok(None);
        }

        let mut data = buf[header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut data, mask);
        }

        Ok(Some((Self::new(header.fin, header.opcode, data), total)))
    }

    /// Serialize the frame into `buf`.
    ///
    /// Servers pass `None`; a mask is only used when building client frames.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::PayloadTooLarge` if the payload length cannot be encoded.
    pub fn write(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) -> Result<()> {
        let header = FrameHeader {
            fin: self.fin,
            rsv: 0,
            opcode: self.opcode,
            mask,
            payload_len: self.payload.len() as u64,
        };
        header.encode(buf)?;

        let start = buf.len();
        buf.put_slice(&self.payload);
        if let Some(mask) = mask {
            apply_mask_fast(&mut buf[start..], mask);
        }
        Ok(())
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let header = FrameHeader {
            fin: self.fin,
            rsv: 0,
            opcode: self.opcode,
            mask: masked.then_some([0; 4]),
            payload_len: self.payload.len() as u64,
        };
        header.encoded_len() + self.payload.len()
    }

    /// Serialize the frame unmasked into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::PayloadTooLarge` if the payload length cannot be encoded.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size(false));
        self.write(&mut buf, None)?;
        Ok(buf.freeze())
    }
}

fn check_payload_len(len: u64, max_payload: usize) -> Result<usize> {
    match usize::try_from(len) {
        Ok(len) if len <= max_payload => Ok(len),
        _ => Err(CodecError::MessageTooLarge {
            size: len,
            max: max_payload,
        }),
    }
}

/// Encode a single unmasked server frame: header followed by payload.
///
/// # Errors
///
/// Returns `CodecError::PayloadTooLarge` if the payload length has bit 63 set.
pub fn encode_frame(opcode: OpCode, payload: &[u8], fin: bool) -> Result<Bytes> {
    Frame::new(fin, opcode, Bytes::copy_from_slice(payload)).to_bytes()
}
