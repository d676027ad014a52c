//! Greeting, capability discovery, `STARTTLS` and authentication.

use std::collections::HashSet;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::states::{Authenticated, Connected, MailTransaction};
use super::{Client, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::framed::FramedStream;
use crate::stream::SmtpStream;
use crate::types::{Address, AuthMechanism, Credentials, Extension, Reply, ReplyCode};
use mchat_oauth::sasl::{decode_challenge, plain_response, xoauth2_response};

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if it is not 2xx.
    pub async fn from_stream(stream: S, timeout: Duration) -> Result<Self> {
        let mut stream = FramedStream::new(stream, timeout);
        let greeting = stream.read_reply().await?;
        if !greeting.is_success() {
            stream.shutdown().await;
            return Err(Error::smtp_error(
                greeting.code.as_u16(),
                greeting.message_text(),
            ));
        }

        // First word after the code
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(%hostname, "Connected");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: std::marker::PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .expect_success(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        self.server_info.extensions = parse_extensions(&reply);
        Ok(self)
    }

    /// Authenticates with the credentials' mechanism.
    ///
    /// # Errors
    ///
    /// Returns `Error::SmtpError` with the server's final reply when the
    /// credentials are rejected.
    pub async fn authenticate(self, credentials: &Credentials) -> Result<Client<S, Authenticated>> {
        let result = match credentials {
            Credentials::Password { username, password } => {
                self.auth_plain(username, password).await
            }
            Credentials::Token {
                username,
                access_token,
            } => self.auth_xoauth2(username, access_token).await,
        };
        if let Err(e) = &result {
            warn!(user = credentials.username(), error = %e, "SMTP authentication failed");
        }
        result
    }

    /// Authenticates using PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.expect_success(&Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(plain_response(username, password)),
        })
        .await?;
        debug!(user = username, "Authenticated");
        Ok(self.transition())
    }

    /// Authenticates using XOAUTH2.
    ///
    /// A rejected token comes back as a 334 challenge carrying the error
    /// JSON; it is answered with an empty line and the final reply is
    /// returned as the error.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_xoauth2(
        mut self,
        username: &str,
        access_token: &str,
    ) -> Result<Client<S, Authenticated>> {
        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::XOAuth2,
                initial_response: Some(xoauth2_response(username, access_token)),
            })
            .await?;

        if reply.is_success() {
            debug!(user = username, "Authenticated");
            return Ok(self.transition());
        }
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        let detail = decode_challenge(&reply.message_text())
            .map(|c| format!("token rejected: status {}", c.status));
        let last = self
            .send_command(&Command::SaslResponse(String::new()))
            .await?;
        Err(Error::smtp_error(
            last.code.as_u16(),
            detail.unwrap_or_else(|| last.message_text()),
        ))
    }

    /// Starts a mail transaction without authentication, for relays that
    /// accept it.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<S, MailTransaction>> {
        self.expect_success(&Command::MailFrom(from)).await?;
        Ok(self.transition())
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the connection to TLS using STARTTLS, then repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` if the server did not advertise
    /// STARTTLS, or the upgrade failure.
    pub async fn starttls(mut self, hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.expect_success(&Command::StartTls).await?;

        let timeout = self.stream.timeout();
        let upgraded = self
            .stream
            .into_inner()
            .upgrade_to_tls(hostname, timeout)
            .await?;
        debug!(%hostname, "TLS established");

        let client = Self {
            stream: FramedStream::new(upgraded, timeout),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: HashSet::new(),
            },
            _state: std::marker::PhantomData,
        };
        client.ehlo(client_hostname).await
    }
}

/// Extensions from an EHLO reply; the first line is the greeting.
fn parse_extensions(reply: &Reply) -> HashSet<Extension> {
    reply
        .message
        .iter()
        .skip(1)
        .map(|line| Extension::parse(line))
        .collect()
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

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_greeting_and_ehlo() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP ready\r\n")
            .write(b"EHLO mchat.local\r\n")
            .read(b"250-smtp.example.com hello\r\n250-AUTH PLAIN XOAUTH2\r\n250 STARTTLS\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        assert_eq!(client.server_info().hostname, "smtp.example.com");

        let client = client.ehlo("mchat.local").await.unwrap();
        assert!(client.server_info().supports_starttls());
        assert_eq!(
            client.server_info().auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::XOAuth2]
        );
    }

    #[tokio::test]
    async fn test_negative_greeting() {
        let mock = Builder::new().read(b"554 no service\r\n").build();
        match Client::from_stream(mock, TIMEOUT).await {
            Err(Error::SmtpError { code, .. }) => assert_eq!(code, 554),
            other => panic!("expected SmtpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_plain() {
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Accepted\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        client.auth_plain("user", "pass").await.unwrap();
    }

    #[tokio::test]
    async fn test_xoauth2_rejection_is_answered() {
        use base64::Engine;
        let challenge = base64::engine::general_purpose::STANDARD
            .encode(r#"{"status":"401","schemes":"Bearer","scope":"https://mail.google.com/"}"#);
        let token_line = format!(
            "AUTH XOAUTH2 {}\r\n",
            xoauth2_response("me@gmail.com", "stale")
        );
        let mock = Builder::new()
            .read(b"220 ready\r\n")
            .write(token_line.as_bytes())
            .read(format!("334 {challenge}\r\n").as_bytes())
            .write(b"\r\n")
            .read(b"535-5.7.8 Username and Password not accepted\r\n535 5.7.8 bad\r\n")
            .build();

        let client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        let err = client
            .authenticate(&Credentials::token("me@gmail.com", "stale"))
            .await
            .unwrap_err();
        match err {
            Error::SmtpError { code, message } => {
                assert_eq!(code, 535);
                assert!(message.contains("401"), "{message}");
            }
            other => panic!("expected SmtpError, got {other:?}"),
        }
    }
}
