//! Blocking message decoder over a byte stream.

use std::io::Read;

use bytes::Bytes;
use tracing::trace;

use crate::config::Limits;
use crate::error::CodecError;
use crate::message::Message;
use crate::protocol::{Frame, MessageAssembler, OpCode};

/// Reads complete messages from a client stream.
///
/// Keep one reader per connection: when a control frame arrives between the
/// fragments of a data message it is returned on its own, and the partial
/// data message stays buffered for the next call.
#[derive(Debug)]
pub struct MessageReader {
    assembler: MessageAssembler,
    max_frame_size: usize,
}

impl MessageReader {
    /// Create a reader enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            max_frame_size: limits.max_frame_size,
            assembler: MessageAssembler::new(limits),
        }
    }

    /// Read frames until one complete message is available.
    ///
    /// # Errors
    ///
    /// Any [`CodecError`]; after an error the connection must be closed, so
    /// the partial message state is discarded.
    pub fn read_message<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<Message, CodecError> {
        loop {
            let result = Frame::read_from(reader, self.max_frame_size)
                .and_then(|frame| {
                    trace!(
                        opcode = %frame.opcode,
                        fin = frame.fin,
                        len = frame.payload().len(),
                        "frame received"
                    );
                    self.assembler.push(frame)
                });

            match result {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(err) => {
                    self.assembler.reset();
                    return Err(err);
                }
            }
        }
    }

    /// Returns `true` while a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.assembler.is_assembling()
    }
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

/// Decode one complete, possibly fragmented, message with default limits.
///
/// Consumes exactly the frames of that message and returns the opcode of its
/// first frame with the concatenated unmasked payload.
///
/// A control frame arriving between the fragments of a data message is
/// returned as the message, and the data fragments read before it are
/// discarded. Use a [`MessageReader`] across calls to keep them.
///
/// # Errors
///
/// - `CodecError::UnmaskedFrame` if a frame lacks the mask bit
/// - `CodecError::TruncatedFrame` if the stream ends mid-frame
/// - `CodecError::InvalidLength` if a 64-bit length has its top bit set
/// - other [`CodecError`]s for frame sequencing and limit violations
pub fn decode_message<R: Read + ?Sized>(reader: &mut R) -> Result<(OpCode, Bytes), CodecError> {
    MessageReader::default()
        .read_message(reader)
        .map(Message::into_parts)
}
