//! WebSocket codec for async I/O.
//!
//! Handshake and frame-level decoding over tokio streams, sharing the
//! protocol core with the blocking [`Connection`](crate::Connection).

#[cfg(feature = "async-tokio")]
mod framed;

#[cfg(feature = "async-tokio")]
pub use framed::WebSocketCodec;
