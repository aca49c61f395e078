//! # wsrv - server side of the WebSocket protocol
//!
//! `wsrv` accepts RFC 6455 WebSocket connections over any byte stream: it
//! negotiates the opening handshake, decodes masked client frames into
//! messages and encodes unmasked server frames.
//!
//! ## Features
//!
//! - **Handshake negotiation** with path, origin and subprotocol checks
//! - **Frame codec** with fragment reassembly and resource limits
//! - **Dispatch policy** mapping every opcode and protocol error to a reaction
//! - **Blocking core** usable with `std::net::TcpStream`, one thread per connection
//! - **Async codec** over tokio streams (`async-tokio` feature, on by default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::TcpListener;
//! use wsrv::{Config, Connection, Echo};
//!
//! let listener = TcpListener::bind("0.0.0.0:25955")?;
//! let config = Config::new("/echo/").with_subprotocol("echo");
//! let stream = listener.accept()?.0;
//! let mut conn = Connection::accept(stream, &config)?;
//! conn.serve(&mut Echo)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod stream;

#[cfg(feature = "async-tokio")]
pub mod codec;

pub use config::{CloseReasonPolicy, Config, Limits, Timeouts};
pub use connection::{Action, Connection, ConnectionState, Echo, MessageHandler, dispatch};
pub use error::{CodecError, Error, HandshakeError, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    ErrorResponse, Frame, HandshakeResponse, MessageReader, OpCode, Session, WS_GUID,
    compute_accept_key, decode_message, encode_frame, negotiate, negotiate_with,
};
pub use stream::ByteStream;

#[cfg(feature = "async-tokio")]
pub use codec::WebSocketCodec;
