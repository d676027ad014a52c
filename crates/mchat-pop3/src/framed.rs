//! Line framing for POP3.
//!
//! Single-line responses end at LF (CRLF expected, bare LF tolerated).
//! Multi-line responses end at a line holding only `.` and are
//! dot-unstuffed as they are read. Every read and write runs under the
//! stream's deadline.

use std::io;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum size of a multi-line body.
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// Framed, deadline-bounded connection for the POP3 protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    timeout: Duration,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream with a per-operation deadline.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(256),
            timeout,
        }
    }

    /// Returns the per-operation deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads one line including its terminator.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` past the deadline, `Error::Io` on EOF.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let limit = self.timeout;
        timeout(limit, read_line_inner(&mut self.reader))
            .await
            .map_err(|_| Error::Timeout(limit))?
    }

    /// Reads a dot-terminated multi-line block.
    ///
    /// The terminator is consumed and not returned. Line endings are kept
    /// and a leading `..` is reduced to `.`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if any line misses the deadline, `Error::Io`
    /// if the connection closes before the terminator.
    pub async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();

        loop {
            let line = self.read_line().await?;
            if is_terminator(&line) {
                return Ok(body);
            }

            let unstuffed = if line.starts_with(b"..") { &line[1..] } else { &line[..] };
            body.extend_from_slice(unstuffed);

            if body.len() > MAX_BODY_SIZE {
                return Err(Error::Protocol(format!(
                    "multi-line response larger than {MAX_BODY_SIZE} bytes"
                )));
            }
        }
    }

    /// Writes one command line (the terminator is appended).
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` past the deadline or the underlying I/O error.
    pub async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.put_slice(line);
        self.write_buffer.put_slice(b"\r\n");

        let limit = self.timeout;
        let buffer = &self.write_buffer;
        let stream = self.reader.get_mut();
        timeout(limit, async move {
            stream.write_all(buffer).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(limit))??;

        Ok(())
    }

    /// Shuts the write half down and drops the connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` past the deadline or the underlying I/O error.
    /// The stream is dropped either way.
    pub async fn close(mut self) -> Result<()> {
        let limit = self.timeout;
        let result = timeout(limit, self.reader.get_mut().shutdown()).await;
        drop(self);
        result.map_err(|_| Error::Timeout(limit))?.map_err(Error::from)
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }
}

async fn read_line_inner<R>(reader: &mut BufReader<R>) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            return Ok(line);
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("line too long".to_string()));
        }
    }
}

fn is_terminator(line: &[u8]) -> bool {
    line == b".\r\n" || line == b".\n"
}

/// Strips a trailing CRLF or LF.
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn framed(input: &[u8]) -> FramedStream<tokio_test::io::Mock> {
        let mock = tokio_test::io::Builder::new().read(input).build();
        FramedStream::new(mock, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_read_line_crlf_and_lf() {
        let mut stream = framed(b"+OK one\r\n+OK two\n");
        assert_eq!(stream.read_line().await.unwrap(), b"+OK one\r\n");
        assert_eq!(stream.read_line().await.unwrap(), b"+OK two\n");
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mut stream = framed(b"+OK partial");
        assert!(matches!(stream.read_line().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_multiline_unstuffs_and_keeps_endings() {
        let mut stream = framed(b"Subject: x\r\n\r\n..hidden dot\r\n...\r\nlast\n.\r\n+OK next\r\n");
        let body = stream.read_multiline().await.unwrap();
        assert_eq!(body, b"Subject: x\r\n\r\n.hidden dot\r\n..\r\nlast\n");
        assert_eq!(stream.read_line().await.unwrap(), b"+OK next\r\n");
    }

    #[tokio::test]
    async fn test_multiline_bare_lf_terminator() {
        let mut stream = framed(b"a\n.\n");
        assert_eq!(stream.read_multiline().await.unwrap(), b"a\n");
    }

    #[tokio::test]
    async fn test_multiline_eof_before_terminator() {
        let mut stream = framed(b"line one\r\nline two\r\n");
        assert!(matches!(stream.read_multiline().await, Err(Error::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let mock = tokio_test::io::Builder::new()
            .wait(Duration::from_secs(10))
            .build();
        let mut stream = FramedStream::new(mock, Duration::from_secs(5));
        assert!(matches!(
            stream.read_line().await,
            Err(Error::Timeout(d)) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        let mock = tokio_test::io::Builder::new().write(b"LIST\r\n").build();
        let mut stream = FramedStream::new(mock, Duration::from_secs(1));
        stream.write_line(b"LIST").await.unwrap();
    }

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line(b"+OK\r\n"), b"+OK");
        assert_eq!(trim_line(b"+OK\n"), b"+OK");
        assert_eq!(trim_line(b"+OK"), b"+OK");
    }
}
