//! Message reassembly for fragmented WebSocket messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::CodecError;
use crate::message::Message;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages.
///
/// The opcode of a message is taken from its first frame; continuation
/// frames only contribute payload. Control frames may arrive between the
/// fragments of a data message and are passed through untouched.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    /// An empty assembler enforcing `limits` on every message.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a frame to the message being assembled.
    ///
    /// Returns `Some(message)` for control frames and for the frame with
    /// FIN=1 that completes a data message, `None` otherwise.
    ///
    /// # Errors
    ///
    /// - `CodecError::ProtocolViolation` on a continuation frame with no
    ///   message in progress, or a new data frame while one is in progress
    /// - `CodecError::MessageTooLarge` / `CodecError::TooManyFragments` when
    ///   the message outgrows the limits
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>, CodecError> {
        if frame.opcode.is_control() {
            return Ok(Some(Message::new(frame.opcode, frame.into_payload())));
        }

        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(CodecError::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (_, Some(_)) => {
                return Err(CodecError::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (opcode, None) => {
                if frame.fin {
                    self.limits.check_message_size(frame.payload().len())?;
                    return Ok(Some(Message::new(opcode, frame.into_payload())));
                }
                self.opcode = Some(opcode);
            }
        }

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;
        self.buffer.extend_from_slice(frame.payload());

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().freeze();
        let opcode = self.opcode.take().unwrap_or(OpCode::Continuation);
        self.fragment_count = 0;
        Ok(Some(Message::new(opcode, payload)))
    }

    /// Returns `true` while a fragmented message is in progress.
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Drop any partially assembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}
