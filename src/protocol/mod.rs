//! WebSocket protocol core implementation (RFC 6455).

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::MessageAssembler;
pub use decoder::{MessageReader, decode_message};
pub use frame::{Frame, FrameHeader, encode_frame};
pub use handshake::{
    ErrorResponse, HandshakeResponse, Session, SessionBuilder, WS_GUID, compute_accept_key,
    negotiate, negotiate_with,
};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
