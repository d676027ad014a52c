//! Line framing for SMTP replies, with a deadline on every read and write.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::Reply;

/// Upper bound on the lines of one reply.
const MAX_REPLY_LINES: usize = 512;

/// Buffered SMTP transport.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
    timeout: Duration,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream. `timeout` bounds each read and write.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            timeout,
        }
    }

    /// Returns the per-operation deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads one line with its line ending removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` past the deadline and an `UnexpectedEof` I/O
    /// error if the server closed the connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = timeout(self.timeout, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Reads a complete, possibly multi-line reply.
    ///
    /// # Errors
    ///
    /// Returns a read error or `Error::Protocol` for a malformed reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::Protocol("reply too long".into()));
            }
        }
        parse_reply(&lines)
    }

    /// Writes and flushes `data`.
    ///
    /// # Errors
    ///
    /// Returns the write error or `Error::Timeout`.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        timeout(self.timeout, async move {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(self.timeout))??;
        Ok(())
    }

    /// Shuts the transport down, bounded by the deadline.
    pub async fn shutdown(&mut self) {
        let _ = timeout(self.timeout, self.reader.get_mut().shutdown()).await;
    }

    /// Returns the underlying stream. Buffered unread input is dropped.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
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
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_multiline_reply_in_chunks() {
        let mock = Builder::new()
            .read(b"250-smtp.example.com\r\n250-PIPEL")
            .read(b"INING\r\n250 8BITMIME\r\n")
            .build();
        let mut framed = FramedStream::new(mock, Duration::from_secs(1));

        let reply = framed.read_reply().await.unwrap();
        assert_eq!(
            reply.message,
            vec!["smtp.example.com", "PIPELINING", "8BITMIME"]
        );
    }

    #[tokio::test]
    async fn test_eof_is_an_error() {
        let mock = Builder::new().read(b"250-half a reply\r\n").build();
        let mut framed = FramedStream::new(mock, Duration::from_secs(1));

        match framed.read_reply().await {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        let mock = Builder::new().wait(Duration::from_secs(10)).build();
        let mut framed = FramedStream::new(mock, Duration::from_millis(100));

        assert!(matches!(framed.read_reply().await, Err(Error::Timeout(_))));
    }
}
