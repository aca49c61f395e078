//! What the server does with each decoded message.

use bytes::Bytes;

use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::OpCode;

/// Server reaction to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand the payload to the application.
    Deliver,
    /// Answer with a pong carrying this payload.
    Pong(Bytes),
    /// Send this close frame and end the connection.
    ///
    /// An empty reason leaves the text to the configured close reason policy.
    Close(CloseFrame),
    /// Nothing to do.
    Ignore,
}

/// Decide how to react to `message`.
///
/// | Opcode | Action |
/// |---|---|
/// | text | deliver |
/// | binary | close 1003 |
/// | reserved data / control | close 1011 |
/// | close | echo the peer's status and reason, 1000 if it sent none |
/// | ping | pong with the same payload |
/// | pong | nothing |
///
/// A bare continuation never leaves the assembler; if one shows up anyway it
/// is treated as a protocol error.
#[must_use]
pub fn dispatch(message: &Message) -> Action {
    match message.opcode {
        OpCode::Text => Action::Deliver,
        OpCode::Binary => Action::Close(CloseFrame::new(CloseCode::UnsupportedData, "")),
        OpCode::ReservedData(_) | OpCode::ReservedControl(_) => {
            Action::Close(CloseFrame::new(CloseCode::InternalError, ""))
        }
        OpCode::Continuation => Action::Close(CloseFrame::new(CloseCode::ProtocolError, "")),
        OpCode::Close => Action::Close(echo_close(message)),
        OpCode::Ping => Action::Pong(message.payload.clone()),
        OpCode::Pong => Action::Ignore,
    }
}

fn echo_close(message: &Message) -> CloseFrame {
    match message.close_frame() {
        None => CloseFrame::new(CloseCode::Normal, ""),
        // 1005/1006/1015 may never appear on the wire.
        Some(frame) if frame.code.is_reserved() => {
            CloseFrame::new(CloseCode::ProtocolError, "")
        }
        Some(frame) => frame,
    }
}
