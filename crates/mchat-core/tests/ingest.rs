//! End-to-end ingestion against an in-process POP3 server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mchat_core::credentials::store_password;
use mchat_core::{
    AccountCredentials, Config, Endpoint, MemorySecrets, MessageStore, Pop3Connector, SqliteStore,
    SyncEngine, assemble,
};

const ALICE: &str = "Delivered-To: me@example.com\r\n\
From: Alice <alice@example.com>\r\n\
To: me@example.com\r\n\
Date: Mon, 2 Jan 2006 15:04:05 +0000\r\n\
Message-ID: <knock@example.com>\r\n\
\r\n\
Knock Knock!\r\n";

const REPLY: &str = "From: Me <me@example.com>\r\n\
To: Alice <alice@example.com>\r\n\
Date: Mon, 2 Jan 2006 15:05:00 +0000\r\n\
X-MCHAT-ID: <1136214300000000000@mchat.mchat>\r\n\
\r\n\
Who's There?\r\n\
\r\n\
On 2006-01-02 Alice wrote:\r\n\
\r\n\
> Knock Knock!\r\n";

/// Serves one POP3 session per accepted connection, `sessions` times.
async fn pop3_server(messages: Vec<&'static str>, sessions: usize) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for _ in 0..sessions {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut reader = BufReader::new(read_half);
            write_half.write_all(b"+OK ready\r\n").await.unwrap();

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let command = line.trim_end().to_string();
                received.push(command.clone());

                let reply = match command.split_once(' ').map_or(command.as_str(), |(verb, _)| verb) {
                    "USER" | "PASS" => "+OK\r\n".to_string(),
                    "LIST" => {
                        let mut out = format!("+OK {} messages\r\n", messages.len());
                        for (i, m) in messages.iter().enumerate() {
                            out.push_str(&format!("{} {}\r\n", i + 1, m.len()));
                        }
                        out.push_str(".\r\n");
                        out
                    }
                    "RETR" => {
                        let id: usize = command[5..].parse().unwrap();
                        format!("+OK\r\n{}.\r\n", messages[id - 1])
                    }
                    "QUIT" => {
                        write_half.write_all(b"+OK bye\r\n").await.unwrap();
                        break;
                    }
                    _ => "-ERR unknown\r\n".to_string(),
                };
                write_half.write_all(reply.as_bytes()).await.unwrap();
            }
        }
        received
    });

    (port, handle)
}

#[tokio::test]
async fn test_ingest_over_tcp_and_assemble() {
    let (port, server) = pop3_server(vec![ALICE, REPLY], 2).await;

    let config = Config {
        user: "me@example.com".into(),
        pop3: Some(Endpoint::new("127.0.0.1", port)),
        ..Config::default()
    };
    let secrets = MemorySecrets::default();
    store_password(&secrets, &config.user, "pw").unwrap();
    let credentials = AccountCredentials::from_config(&config, secrets).unwrap();
    let connector = Pop3Connector::from_endpoint(&config.pop3_endpoint(), Duration::from_secs(2));
    let store = SqliteStore::in_memory().await.unwrap();

    let mut engine = SyncEngine::new(connector, credentials, store, config.poll_interval(), 8);
    let mut rx = engine.subscribe();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!((report.listed, report.new), (2, 2));
    assert_eq!(rx.recv().await.unwrap().content, "Knock Knock!\r\n");
    assert_eq!(rx.recv().await.unwrap().content, "Who's There?");

    let report = engine.run_cycle().await.unwrap();
    assert_eq!((report.new, report.duplicates), (0, 2));

    let chats = assemble(&engine.store().load_all().await.unwrap());
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].address, "alice@example.com");
    assert_eq!(chats[0].name, "Alice");
    assert_eq!(chats[0].messages.len(), 2);

    let received = server.await.unwrap();
    assert_eq!(
        received,
        [
            "USER me@example.com",
            "PASS pw",
            "LIST",
            "RETR 1",
            "RETR 2",
            "QUIT",
            "USER me@example.com",
            "PASS pw",
            "LIST",
            "RETR 1",
            "RETR 2",
            "QUIT",
        ]
    );
}

#[tokio::test]
async fn test_unreachable_server_is_cycle_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = Config {
        user: "me@example.com".into(),
        ..Config::default()
    };
    let secrets = MemorySecrets::default();
    store_password(&secrets, &config.user, "pw").unwrap();
    let credentials = AccountCredentials::from_config(&config, secrets).unwrap();
    let connector = Pop3Connector::new("127.0.0.1", port, Duration::from_millis(500));
    let mut engine = SyncEngine::new(
        connector,
        credentials,
        SqliteStore::in_memory().await.unwrap(),
        Duration::from_secs(15),
        8,
    );

    assert!(engine.run_cycle().await.is_err());
}
