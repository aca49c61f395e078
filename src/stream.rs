//! Blocking byte stream shared by the handshake and the frame codec.
//!
//! The handshake reads the request head line by line through a buffer. The
//! bytes a client pipelines right after the blank line already belong to the
//! first frame, so the same buffered stream must be handed to the decoder.

use std::io::{self, BufRead, BufReader, Read, Write};

/// Default read buffer size (in bytes).
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A buffered, bidirectional byte stream over a socket-like `S`.
///
/// Reads go through an internal buffer, writes go straight to `S`. Reaching
/// end of stream or a read error ends the read side only: a client that
/// half-closes after its request still gets its response. Write errors and
/// [`ByteStream::mark_closed`] end both sides.
#[derive(Debug)]
pub struct ByteStream<S> {
    inner: BufReader<S>,
    eof: bool,
    closed: bool,
}

impl<S: Read> ByteStream<S> {
    /// Wrap a stream with the default buffer size.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner)
    }

    /// Wrap a stream with a read buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, inner: S) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, inner),
            eof: false,
            closed: false,
        }
    }

    /// Read exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Fails with `UnexpectedEof` if the stream ends first, or with the
    /// underlying I/O error.
    pub fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<S> ByteStream<S> {
    /// Returns `true` once end of stream or an I/O error was observed, or
    /// after [`ByteStream::mark_closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.eof || self.closed
    }

    /// Returns `true` while writes are still accepted.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self.closed
    }

    /// Mark the stream closed; later writes fail with `NotConnected`.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.inner.get_ref()
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Reading from it directly skips buffered bytes.
    pub fn get_mut(&mut self) -> &mut S {
        self.inner.get_mut()
    }

    /// Bytes read from the socket but not consumed yet.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        self.inner.buffer()
    }

    /// Unwrap the underlying stream, discarding buffered bytes.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    fn track_read<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(ref err) = result {
            if err.kind() != io::ErrorKind::Interrupted {
                self.eof = true;
            }
        }
        result
    }

    fn track_write<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(ref err) = result {
            if err.kind() != io::ErrorKind::Interrupted {
                self.closed = true;
            }
        }
        result
    }
}

impl<S: Read> Read for ByteStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        if matches!(result, Ok(0)) && !buf.is_empty() {
            self.eof = true;
        }
        self.track_read(result)
    }
}

impl<S: Read> BufRead for ByteStream<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        // Borrowck: check for EOF first, then hand out the buffer.
        let result = self.inner.fill_buf().map(|buf| buf.is_empty());
        match self.track_read(result)? {
            true => {
                self.eof = true;
                Ok(&[])
            }
            false => self.inner.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
    }
}

impl<S: Write> Write for ByteStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "stream is closed",
            ));
        }
        let result = self.inner.get_mut().write(buf);
        self.track_write(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.get_mut().flush();
        self.track_write(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_bytes() {
        let mut stream = ByteStream::new(Cursor::new(b"abcdef".to_vec()));
        assert_eq!(stream.read_bytes(4).unwrap(), b"abcd");
        assert!(!stream.is_closed());
        assert_eq!(stream.read_bytes(2).unwrap(), b"ef");
    }

    #[test]
    fn test_short_read_closes() {
        let mut stream = ByteStream::new(Cursor::new(b"ab".to_vec()));
        let err = stream.read_bytes(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(stream.is_closed());
    }

    #[test]
    fn test_lines_then_bytes_share_buffer() {
        let mut stream = ByteStream::new(Cursor::new(b"line one\r\n\r\nrest".to_vec()));
        let mut line = String::new();
        stream.read_line(&mut line).unwrap();
        assert_eq!(line, "line one\r\n");
        line.clear();
        stream.read_line(&mut line).unwrap();
        assert_eq!(line, "\r\n");
        assert_eq!(stream.buffered(), b"rest");
        assert_eq!(stream.read_bytes(4).unwrap(), b"rest");
    }

    #[test]
    fn test_write_after_read_eof() {
        let mut stream = ByteStream::new(Cursor::new(b"req".to_vec()));
        let mut line = String::new();
        stream.read_line(&mut line).unwrap();
        assert_eq!(stream.read_bytes(1).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        assert!(stream.is_closed());
        assert!(stream.is_writable());
        stream.write_all(b"response").unwrap();
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut stream = ByteStream::new(Cursor::new(Vec::new()));
        stream.write_all(b"ok").unwrap();
        stream.mark_closed();
        assert!(!stream.is_writable());
        let err = stream.write_all(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(stream.get_ref().get_ref(), b"ok");
    }
}
