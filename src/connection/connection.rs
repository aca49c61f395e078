use std::io::{Read, Write};

use bytes::{Bytes, BytesMut};
use tracing::{debug, instrument, warn};

use crate::config::{CloseReasonPolicy, Config};
use crate::connection::ConnectionState;
use crate::connection::dispatch::{Action, dispatch};
use crate::error::{CodecError, Error, Result};
use crate::message::{CloseCode, Message};
use crate::protocol::handshake::{Session, negotiate_with};
use crate::protocol::{Frame, MessageReader, OpCode};
use crate::stream::ByteStream;

/// Application side of a connection.
///
/// Receives every text message. Returning `Some(reply)` sends `reply` back as
/// a text frame; returning an error closes the connection with 1011.
pub trait MessageHandler {
    /// Handle one text message.
    ///
    /// # Errors
    ///
    /// Any error ends the connection with close status 1011.
    fn on_text(&mut self, session: &Session, payload: Bytes) -> Result<Option<Bytes>>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Session, Bytes) -> Result<Option<Bytes>>,
{
    fn on_text(&mut self, session: &Session, payload: Bytes) -> Result<Option<Bytes>> {
        self(session, payload)
    }
}

/// Handler sending every text message back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl MessageHandler for Echo {
    fn on_text(&mut self, _session: &Session, payload: Bytes) -> Result<Option<Bytes>> {
        Ok(Some(payload))
    }
}

/// A server-side WebSocket connection over a blocking stream.
///
/// `Connection` owns its stream for the whole lifetime of the connection;
/// dropping it releases the socket on every exit path.
///
/// ## Example
///
/// ```rust,no_run
/// use std::net::TcpListener;
/// use wsrv::{Config, Connection, Echo};
///
/// let listener = TcpListener::bind("127.0.0.1:25955")?;
/// let config = Config::new("/echo/").with_subprotocol("echo");
/// for stream in listener.incoming() {
///     let mut conn = Connection::accept(stream?, &config)?;
///     conn.serve(&mut Echo)?;
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Connection<S> {
    stream: ByteStream<S>,
    session: Session,
    state: ConnectionState,
    reader: MessageReader,
    close_reason: CloseReasonPolicy,
}

impl<S> Connection<S> {
    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is in an open state.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// The negotiated session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Release the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "connection state");
            self.state = next;
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Run the opening handshake on `stream` and open the connection.
    ///
    /// # Errors
    ///
    /// `Error::Handshake` if negotiation failed; the error response has been
    /// written and the stream is dropped.
    pub fn accept(stream: S, config: &Config) -> Result<Self> {
        let mut stream = ByteStream::new(stream);
        let session = negotiate_with(&mut stream, config)?;
        Ok(Self::from_parts(stream, session, config))
    }

    /// Open a connection over a stream whose handshake already completed.
    ///
    /// `stream` must be the same buffered stream the handshake read from, so
    /// frame bytes the client pipelined behind its request are not lost.
    pub fn from_parts(stream: ByteStream<S>, session: Session, config: &Config) -> Self {
        let mut conn = Self {
            stream,
            session,
            state: ConnectionState::Handshaking,
            reader: MessageReader::new(config.limits.clone()),
            close_reason: config.close_reason.clone(),
        };
        conn.transition(ConnectionState::Open);
        conn
    }

    /// Receive the next complete message.
    ///
    /// Protocol violations are answered with the matching close frame before
    /// the error is returned; the connection is closed afterwards.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is no longer open
    /// - `Error::Codec` on any decoding failure
    pub fn recv(&mut self) -> Result<Message> {
        if !self.state.can_receive() {
            return Err(Error::ConnectionClosed);
        }

        match self.reader.read_message(&mut self.stream) {
            Ok(message) => Ok(message),
            Err(err) => {
                self.fail(&err);
                Err(err.into())
            }
        }
    }

    fn fail(&mut self, err: &CodecError) {
        match err.close_code() {
            Some(code) => {
                warn!(error = %err, code = code.as_u16(), "closing on protocol violation");
                if let Err(write_err) = self.send_close(code, None) {
                    debug!(error = %write_err, "close frame not delivered");
                }
            }
            None => debug!(error = %err, "stream ended"),
        }
        self.stream.mark_closed();
        self.transition(ConnectionState::Closed);
    }

    /// Send a single unfragmented text frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is not open
    /// - `Error::Codec` / `Error::Io` if encoding or writing fails
    pub fn send_text(&mut self, payload: &[u8]) -> Result<()> {
        self.send_frame(&Frame::new(true, OpCode::Text, Bytes::copy_from_slice(payload)))
    }

    /// Send a close frame and move to `Closing`.
    ///
    /// Without a reason, the configured [`CloseReasonPolicy`] decides whether
    /// the payload carries text after the status.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the connection is not open
    /// - `Error::Codec` if `code` may not be sent on the wire
    /// - `Error::Io` if writing fails
    pub fn send_close(&mut self, code: CloseCode, reason: Option<&str>) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::ConnectionClosed);
        }
        if code.is_reserved() {
            return Err(CodecError::ProtocolViolation(format!("reserved close code {code}")).into());
        }

        let reason = self.close_reason.resolve(code.as_u16(), reason);
        let frame = Frame::close(code, reason);
        self.transition(ConnectionState::Closing);
        self.write_frame(&frame)
    }

    /// Close with the default status, 1002 protocol error, and no reason.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send_close`].
    pub fn close(&mut self) -> Result<()> {
        self.send_close(CloseCode::ProtocolError, None)
    }

    /// Send the keepalive ping, payload `"PING"`.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send_text`].
    pub fn send_ping(&mut self) -> Result<()> {
        self.send_frame(&Frame::ping())
    }

    /// Send a pong echoing `data`.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send_text`], plus `Error::Codec` if `data`
    /// exceeds 125 bytes.
    pub fn send_pong(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD {
            return Err(CodecError::ProtocolViolation("pong payload too large".into()).into());
        }
        self.send_frame(&Frame::pong(Bytes::copy_from_slice(data)))
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::ConnectionClosed);
        }
        self.write_frame(frame)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut buf = BytesMut::with_capacity(frame.wire_size(false));
        frame.write(&mut buf, None)?;
        self.stream.write_all(&buf)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Serve the connection until it closes.
    ///
    /// Text messages go to `handler`, everything else follows the dispatch
    /// table in [`dispatch`](crate::connection::dispatch::dispatch). Returns
    /// `Ok(())` once a close frame was sent for a peer close or a policy
    /// close.
    ///
    /// # Errors
    ///
    /// - `Error::Codec` on protocol violations or a vanished peer
    /// - `Error::Handler` if the handler failed
    /// - `Error::Io` if writing a reply fails
    #[instrument(
        level = "debug",
        skip_all,
        fields(path = self.session.path(), protocol = self.session.protocol())
    )]
    pub fn serve<H: MessageHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        loop {
            let message = self.recv()?;
            match dispatch(&message) {
                Action::Deliver => match handler.on_text(&self.session, message.payload) {
                    Ok(Some(reply)) => self.send_text(&reply)?,
                    Ok(None) => {}
                    Err(err) => {
                        warn!(error = %err, "handler failed");
                        if let Err(close_err) = self.send_close(CloseCode::InternalError, None) {
                            debug!(error = %close_err, "close frame not delivered");
                        }
                        self.transition(ConnectionState::Closed);
                        return Err(Error::Handler(err.to_string()));
                    }
                },
                Action::Pong(payload) => self.send_pong(&payload)?,
                Action::Close(frame) => {
                    debug!(code = frame.code.as_u16(), "closing");
                    let reason = Some(frame.reason.as_str()).filter(|r| !r.is_empty());
                    self.send_close(frame.code, reason)?;
                    self.transition(ConnectionState::Closed);
                    return Ok(());
                }
                Action::Ignore => {}
            }
        }
    }
}
