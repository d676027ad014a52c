//! End-to-end submission against an in-process SMTP server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mchat_smtp::{Address, Config, Credentials, Error, Security, send_mail};

/// Accepts one connection and plays a minimal submission server.
///
/// Returns every line the client sent, DATA content included.
async fn fake_server(rcpt_reply: &'static str) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut received = Vec::new();
        let mut in_data = false;

        write_half.write_all(b"220 fake.smtp ESMTP\r\n").await.unwrap();

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            received.push(line.clone());

            let reply: &[u8] = if in_data {
                if line == "." {
                    in_data = false;
                    b"250 2.0.0 queued\r\n"
                } else {
                    continue;
                }
            } else if line.starts_with("EHLO") {
                b"250-fake.smtp\r\n250-AUTH PLAIN\r\n250 8BITMIME\r\n"
            } else if line.starts_with("AUTH PLAIN") {
                b"235 2.7.0 ok\r\n"
            } else if line.starts_with("MAIL FROM") {
                b"250 ok\r\n"
            } else if line.starts_with("RCPT TO") {
                rcpt_reply.as_bytes()
            } else if line == "DATA" {
                in_data = true;
                b"354 end with .\r\n"
            } else if line == "QUIT" {
                write_half.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                b"500 unrecognized\r\n"
            };
            write_half.write_all(reply).await.unwrap();
        }
        received
    });

    (port, handle)
}

fn local_config(port: u16) -> Config {
    Config::builder("127.0.0.1")
        .security(Security::None)
        .port(port)
        .timeout(Duration::from_secs(2))
        .client_hostname("mchat.test")
        .build()
}

#[tokio::test]
async fn test_send_mail_plaintext_relay() {
    let (port, server) = fake_server("250 ok\r\n").await;

    send_mail(
        &local_config(port),
        &Credentials::password("me@example.com", "pw"),
        &Address::new("me@example.com").unwrap(),
        &[Address::new("you@example.com").unwrap()],
        b"Subject: hi\r\n\r\n.leading dot\r\nbye\r\n",
    )
    .await
    .unwrap();

    let received = server.await.unwrap();
    assert_eq!(received[0], "EHLO mchat.test");
    assert!(received[1].starts_with("AUTH PLAIN "));
    assert_eq!(received[2], "MAIL FROM:<me@example.com>");
    assert_eq!(received[3], "RCPT TO:<you@example.com>");
    assert_eq!(received[4], "DATA");
    assert!(received.contains(&"..leading dot".to_string()));
    assert_eq!(received.last().map(String::as_str), Some("QUIT"));
}

#[tokio::test]
async fn test_send_mail_recipient_rejected() {
    let (port, server) = fake_server("550 5.1.1 unknown\r\n").await;

    let err = send_mail(
        &local_config(port),
        &Credentials::password("me@example.com", "pw"),
        &Address::new("me@example.com").unwrap(),
        &[Address::new("ghost@example.com").unwrap()],
        b"Subject: hi\r\n\r\nhello\r\n",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::SmtpError { code: 550, .. }));
    server.abort();
}

#[tokio::test]
async fn test_starttls_required_but_not_offered() {
    let (port, server) = fake_server("250 ok\r\n").await;
    let config = Config::builder("127.0.0.1")
        .security(Security::StartTls)
        .port(port)
        .build();

    let err = send_mail(
        &config,
        &Credentials::password("me@example.com", "pw"),
        &Address::new("me@example.com").unwrap(),
        &[Address::new("you@example.com").unwrap()],
        b"hello",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NotSupported(_)));
    server.abort();
}
