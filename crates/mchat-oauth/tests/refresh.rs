//! Token refresh against a local token endpoint.

#![allow(clippy::unwrap_used)]

use mchat_oauth::{Error, OAuthClient, Provider, Token};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one HTTP response and returns the request it received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/token", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                    .unwrap_or(0);
                if request.len() >= head_end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8(request).unwrap()
    });

    (url, handle)
}

#[tokio::test]
async fn refresh_keeps_refresh_token_when_not_returned() {
    let (url, server) = serve_once("200 OK", r#"{"access_token":"new-access","token_type":"Bearer","expires_in":3600}"#).await;
    let client = OAuthClient::new("client-1", Provider::new("Local", &url).unwrap()).with_client_secret("s3cret");

    let token = client
        .active_token(&Token::from_refresh_token("refresh-1"))
        .await
        .unwrap();

    assert_eq!(token.access_token, "new-access");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!token.is_expired());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /token"));
    assert!(request.contains("grant_type=refresh_token"));
    assert!(request.contains("refresh_token=refresh-1"));
    assert!(request.contains("client_secret=s3cret"));
}

#[tokio::test]
async fn refresh_rejection_is_oauth_error() {
    let (url, server) = serve_once(
        "400 Bad Request",
        r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
    )
    .await;
    let client = OAuthClient::new("client-1", Provider::new("Local", &url).unwrap());

    let err = client
        .refresh_token(&Token::from_refresh_token("revoked"))
        .await
        .unwrap_err();

    assert!(err.is_invalid_grant());
    assert!(matches!(err, Error::OAuth { ref error, .. } if error == "invalid_grant"));
    server.await.unwrap();
}
