use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{instrument, trace};

use crate::config::{Config, Limits};
use crate::error::{CodecError, HandshakeError, Result};
use crate::message::Message;
use crate::protocol::handshake::{Reply, Session, SessionBuilder, decode_line, reply};
use crate::protocol::{Frame, MessageAssembler};

const READ_CHUNK: usize = 4096;
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Server-side WebSocket codec over an async stream.
///
/// Frames are parsed out of an internal read buffer; bytes the client sends
/// right behind its handshake request stay in that buffer for the first
/// frame.
pub struct WebSocketCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    assembler: MessageAssembler,
    limits: Limits,
}

impl<T> WebSocketCodec<T> {
    /// Wrap a stream whose handshake already completed.
    #[must_use]
    pub fn new(io: T, limits: Limits) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::with_capacity(READ_CHUNK),
            assembler: MessageAssembler::new(limits.clone()),
            limits,
        }
    }

    /// Limits applied to incoming frames and messages.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Bytes received but not decoded yet.
    #[must_use]
    pub fn read_buffer(&self) -> &[u8] {
        &self.read_buf
    }

    /// Give back the underlying I/O object. Buffered bytes are lost.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocketCodec<T> {
    /// Negotiate the opening handshake on `io` and return a codec ready for
    /// frames.
    ///
    /// Exactly one HTTP response is written, `101` on success or the error
    /// response otherwise.
    ///
    /// # Errors
    ///
    /// `Error::Handshake` with the reason the request was rejected.
    #[instrument(level = "debug", skip_all, fields(path = %config.path))]
    pub async fn negotiate(io: T, config: &Config) -> Result<(Self, Session)> {
        let mut codec = Self::new(io, config.limits.clone());
        let outcome = codec.read_head().await.and_then(|head| {
            let builder = SessionBuilder::new(&config.path, config.origin.as_deref());
            parse_head(&head, builder)?.finish(&config.subprotocols)
        });
        let Reply { bytes, outcome } = reply(outcome);

        if !bytes.is_empty() {
            let written = match codec.io.write_all(&bytes).await {
                Ok(()) => codec.io.flush().await,
                Err(err) => Err(err),
            };
            if let Err(err) = written {
                return Err(outcome.err().unwrap_or_else(|| err.into()).into());
            }
        }

        let session = outcome?;
        Ok((codec, session))
    }

    async fn read_head(&mut self) -> std::result::Result<BytesMut, HandshakeError> {
        let max = self.limits.max_handshake_size;
        let mut searched = 0;
        loop {
            if let Some(pos) = find(&self.read_buf[searched..], HEAD_TERMINATOR) {
                let end = searched + pos + HEAD_TERMINATOR.len();
                if end > max {
                    return Err(HandshakeError::HandshakeTooLarge { max });
                }
                return Ok(self.read_buf.split_to(end));
            }
            if self.read_buf.len() > max {
                return Err(HandshakeError::HandshakeTooLarge { max });
            }
            searched = self.read_buf.len().saturating_sub(HEAD_TERMINATOR.len() - 1);

            self.read_buf.reserve(READ_CHUNK);
            if self.io.read_buf(&mut self.read_buf).await? == 0 {
                // Headers end with the stream.
                return Ok(self.read_buf.split());
            }
        }
    }

    /// Read one frame.
    ///
    /// # Errors
    ///
    /// `Error::Codec` on malformed frames; `CodecError::TruncatedFrame` if
    /// the stream ends mid-frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, consumed)) = Frame::parse(&self.read_buf, self.limits.max_frame_size)? {
                self.read_buf.advance(consumed);
                trace!(opcode = %frame.opcode, fin = frame.fin, "frame received");
                return Ok(frame);
            }

            self.read_buf.reserve(READ_CHUNK);
            let n = self
                .io
                .read_buf(&mut self.read_buf)
                .await
                .map_err(CodecError::from)?;
            if n == 0 {
                return Err(CodecError::TruncatedFrame.into());
            }
        }
    }

    /// Read one complete message, reassembling fragments.
    ///
    /// Control frames arriving between fragments are returned on their own.
    ///
    /// # Errors
    ///
    /// Same as [`WebSocketCodec::read_frame`], plus sequencing and limit
    /// violations.
    pub async fn read_message(&mut self) -> Result<Message> {
        loop {
            let pushed = match self.read_frame().await {
                Ok(frame) => self.assembler.push(frame).map_err(Into::into),
                Err(err) => Err(err),
            };
            match pushed {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => {}
                Err(err) => {
                    self.assembler.reset();
                    return Err(err);
                }
            }
        }
    }

    /// Write one unmasked frame without flushing.
    ///
    /// # Errors
    ///
    /// `Error::Codec` if the frame cannot be encoded, `Error::Io` on write
    /// failure.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        frame.write(&mut self.write_buf, None)?;
        self.io.write_all(&self.write_buf).await?;
        Ok(())
    }

    /// Flush buffered frames to the underlying I/O object.
    ///
    /// # Errors
    ///
    /// `Error::Io` on write failure.
    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_head<'a>(
    head: &[u8],
    mut builder: SessionBuilder<'a>,
) -> std::result::Result<SessionBuilder<'a>, HandshakeError> {
    let mut lines = head.split(|&b| b == b'\n').map(decode_line);
    let request_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| HandshakeError::MalformedRequestLine("empty request".into()))?;
    builder.request_line(&request_line)?;

    for line in lines.take_while(|line| !line.is_empty()) {
        builder.header_line(&line)?;
    }
    Ok(builder)
}
