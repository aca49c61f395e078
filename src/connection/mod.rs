//! Server-side connection handling.
//!
//! ## Connection Lifecycle
//!
//! 1. **Handshaking** - opening handshake in progress
//! 2. **Open** - handshake accepted, messages flow
//! 3. **Closing** - close frame sent
//! 4. **Closed** - stream released
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//! use wsrv::{CloseCode, Config, Connection};
//!
//! # fn run(stream: TcpStream) -> wsrv::Result<()> {
//! let config = Config::new("/echo/").with_subprotocol("echo");
//! let mut conn = Connection::accept(stream, &config)?;
//!
//! let msg = conn.recv()?;
//! conn.send_text(&msg.payload)?;
//! conn.send_close(CloseCode::Normal, None)?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
mod state;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::{Connection, Echo, MessageHandler};
pub use dispatch::{Action, dispatch};
pub use state::ConnectionState;
