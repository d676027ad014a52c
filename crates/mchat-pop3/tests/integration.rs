//! Integration tests for the POP3 client.
//!
//! A mock stream replays canned server output and records what the client
//! sent; a small TCP server covers the real transport path.

#![allow(clippy::unwrap_used, clippy::cast_possible_truncation)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpListener;

use mchat_pop3::{Client, Config, Credentials, Error, MessageInfo, Security, Session};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responses: Cursor::new(responses.to_vec()),
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = self.responses.position() as usize;

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_text(sent: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(sent.lock().unwrap().clone()).unwrap()
}

#[tokio::test]
async fn test_full_password_session() {
    let (stream, sent) = MockStream::new(
        b"+OK POP3 server ready\r\n\
+OK user accepted\r\n\
+OK maildrop locked\r\n\
+OK 2 messages (45 octets)\r\n\
1 20\r\n\
2 25\r\n\
.\r\n\
+OK 20 octets\r\n\
Subject: one\r\n\
\r\n\
..dot\r\n\
.\r\n\
+OK bye\r\n",
    );

    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let mut client = client.login("alice", "s3cret").await.unwrap();

    let listing = client.list().await.unwrap();
    assert_eq!(
        listing,
        vec![MessageInfo { id: 1, size: 20 }, MessageInfo { id: 2, size: 25 }]
    );

    let raw = client.retrieve(1).await.unwrap();
    assert_eq!(raw.as_bytes(), b"Subject: one\r\n\r\n.dot\r\n");

    client.quit().await.unwrap();

    assert_eq!(
        sent_text(&sent),
        "USER alice\r\nPASS s3cret\r\nLIST\r\nRETR 1\r\nQUIT\r\n"
    );
}

#[tokio::test]
async fn test_xoauth2_exchange() {
    let (stream, sent) = MockStream::new(b"+OK ready\r\n+ \r\n+OK welcome\r\n+OK 0 messages\r\n.\r\n");

    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let mut client = client
        .authenticate_xoauth2("me@gmail.com", "ya29.token")
        .await
        .unwrap();
    assert!(client.list().await.unwrap().is_empty());

    let text = sent_text(&sent);
    let mut lines = text.split("\r\n");
    assert_eq!(lines.next(), Some("AUTH XOAUTH2"));
    let decoded = STANDARD.decode(lines.next().unwrap()).unwrap();
    assert_eq!(decoded, b"user=me@gmail.com\x01auth=Bearer ya29.token\x01\x01");
    assert_eq!(lines.next(), Some("LIST"));
}

#[tokio::test]
async fn test_xoauth2_rejected_token() {
    let challenge = STANDARD.encode(r#"{"status":"401","schemes":"bearer"}"#);
    let script = format!("+OK ready\r\n+ \r\n+ {challenge}\r\n-ERR invalid credentials\r\n+OK bye\r\n");
    let (stream, sent) = MockStream::new(script.as_bytes());

    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let err = client
        .authenticate_xoauth2("me@gmail.com", "expired")
        .await
        .unwrap_err();

    match err {
        Error::Auth(message) => assert!(message.contains("401"), "{message}"),
        other => panic!("expected Auth error, got {other:?}"),
    }
    assert!(sent_text(&sent).ends_with("\r\n\r\nQUIT\r\n"));
}

#[tokio::test]
async fn test_xoauth2_rejected_token_survives_server_hangup() {
    let challenge = STANDARD.encode(r#"{"status":"400","schemes":"bearer"}"#);
    let script = format!("+OK ready\r\n+ \r\n+ {challenge}\r\n");
    let (stream, sent) = MockStream::new(script.as_bytes());

    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let err = client
        .authenticate_xoauth2("me@gmail.com", "expired")
        .await
        .unwrap_err();

    match err {
        Error::Auth(message) => assert!(message.contains("status 400"), "{message}"),
        other => panic!("expected Auth error, got {other:?}"),
    }
    assert!(sent_text(&sent).contains("\r\n\r\n"));
}

#[tokio::test]
async fn test_auth_rejected_without_continuation() {
    let (stream, _) = MockStream::new(b"+OK ready\r\n-ERR mechanism not supported\r\n+OK bye\r\n");
    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    assert!(matches!(
        client.authenticate_xoauth2("me", "tok").await,
        Err(Error::Auth(_))
    ));
}

#[tokio::test]
async fn test_negative_greeting_is_connect_error() {
    let (stream, _) = MockStream::new(b"-ERR server busy\r\n");
    assert!(matches!(
        Client::from_stream(stream, TIMEOUT).await,
        Err(Error::Connect(_))
    ));
}

#[tokio::test]
async fn test_list_entry_garbage_is_list_error() {
    let (stream, _) = MockStream::new(b"+OK\r\n+OK\r\n+OK\r\n+OK 2\r\n1 10\r\nnope\r\n");
    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let mut client = client.login("a", "b").await.unwrap();
    assert!(matches!(client.list().await, Err(Error::List(_))));
}

#[tokio::test]
async fn test_list_missing_terminator_is_list_error() {
    let (stream, _) = MockStream::new(b"+OK\r\n+OK\r\n+OK\r\n+OK 1\r\n1 10\r\n2 20\r\n.\r\n");
    let client = Client::from_stream(stream, TIMEOUT).await.unwrap();
    let mut client = client.login("a", "b").await.unwrap();
    assert!(matches!(client.list().await, Err(Error::List(_))));
}

#[tokio::test]
async fn test_list_huge_count_fails_without_allocating() {
    let (stream, _) = MockStream::new(b"+OK\r\n+OK\r\n+OK\r\n+OK 18446744073709551615 messages\r\n1 10\r\n");
    let mut session = Session::from_stream(stream, TIMEOUT).await.unwrap();
    session.authenticate(&Credentials::password("a", "b")).await.unwrap();

    let err = session.list().await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!session.is_usable());
}

#[tokio::test]
async fn test_retrieve_eof_mid_body_is_fatal() {
    let (stream, _) = MockStream::new(b"+OK\r\n+OK\r\n+OK\r\n+OK\r\nSubject: cut\r\n");
    let mut session = Session::from_stream(stream, TIMEOUT).await.unwrap();
    session.authenticate(&Credentials::password("a", "b")).await.unwrap();

    let err = session.retrieve(1).await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(!session.is_usable());
}

/// Serves a scripted POP3 dialogue over TCP.
///
/// Each step is (expected command prefix, reply). A `None` reply makes the
/// server go silent from that point on.
async fn fake_server(script: Vec<(&'static str, Option<&'static str>)>) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut received = Vec::new();

        write_half.write_all(b"+OK fake pop3 ready\r\n").await.unwrap();

        for (expected, reply) in script {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            assert!(line.starts_with(expected), "expected {expected:?}, got {line:?}");
            received.push(line.trim_end().to_string());

            match reply {
                Some(reply) => write_half.write_all(reply.as_bytes()).await.unwrap(),
                None => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    break;
                }
            }
        }
        received
    });

    (port, handle)
}

fn local_config(port: u16, timeout: Duration) -> Config {
    Config::builder("127.0.0.1")
        .security(Security::None)
        .port(port)
        .timeout(timeout)
        .build()
}

#[tokio::test]
async fn test_session_over_tcp() {
    let (port, server) = fake_server(vec![
        ("USER bob", Some("+OK\r\n")),
        ("PASS pw", Some("+OK\r\n")),
        ("LIST", Some("+OK 1 messages\r\n1 11\r\n.\r\n")),
        ("RETR 1", Some("+OK\r\nhello world\r\n.\r\n")),
        ("QUIT", Some("+OK bye\r\n")),
    ])
    .await;

    let mut session = Session::connect(&local_config(port, TIMEOUT)).await.unwrap();
    session.authenticate(&Credentials::password("bob", "pw")).await.unwrap();
    let listing = session.list().await.unwrap();
    assert_eq!(listing.len(), 1);
    let raw = session.retrieve(listing[0].id).await.unwrap();
    assert_eq!(raw.as_bytes(), b"hello world\r\n");
    session.quit().await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_quit_closes_even_when_server_is_silent() {
    let (port, server) = fake_server(vec![
        ("USER bob", Some("+OK\r\n")),
        ("PASS pw", Some("+OK\r\n")),
        ("QUIT", None),
    ])
    .await;

    let mut session = Session::connect(&local_config(port, Duration::from_millis(200)))
        .await
        .unwrap();
    session.authenticate(&Credentials::password("bob", "pw")).await.unwrap();

    let started = std::time::Instant::now();
    let result = session.quit().await;
    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.state(), "closed");

    server.abort();
}
