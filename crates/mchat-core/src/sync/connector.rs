//! Session seams between the engine and the POP3 client.

use std::future::Future;
use std::time::Duration;

use mchat_pop3::{Config, Credentials, MessageInfo, Pop3Stream, RawMessage, Security, Session};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::config::Endpoint;

/// An open mailbox session.
///
/// Mirrors [`mchat_pop3::Session`]: commands are only valid in protocol
/// order and `quit` on a closed session is a no-op.
pub trait MailDrop: Send {
    /// Authenticates the session.
    fn authenticate(
        &mut self,
        credentials: &Credentials,
    ) -> impl Future<Output = mchat_pop3::Result<()>> + Send;

    /// Lists the mailbox.
    fn list(&mut self) -> impl Future<Output = mchat_pop3::Result<Vec<MessageInfo>>> + Send;

    /// Retrieves one message.
    fn retrieve(&mut self, id: u32) -> impl Future<Output = mchat_pop3::Result<RawMessage>> + Send;

    /// Ends the session.
    fn quit(&mut self) -> impl Future<Output = mchat_pop3::Result<()>> + Send;

    /// Returns true while the session accepts commands.
    fn is_usable(&self) -> bool;
}

impl<S> MailDrop for Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn authenticate(&mut self, credentials: &Credentials) -> mchat_pop3::Result<()> {
        Self::authenticate(self, credentials).await
    }

    async fn list(&mut self) -> mchat_pop3::Result<Vec<MessageInfo>> {
        Self::list(self).await
    }

    async fn retrieve(&mut self, id: u32) -> mchat_pop3::Result<RawMessage> {
        Self::retrieve(self, id).await
    }

    async fn quit(&mut self) -> mchat_pop3::Result<()> {
        Self::quit(self).await
    }

    fn is_usable(&self) -> bool {
        Self::is_usable(self)
    }
}

/// Opens mailbox sessions.
pub trait Connector: Send + Sync {
    /// Session type produced.
    type Session: MailDrop;

    /// Opens a session for `credentials`.
    fn connect(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = mchat_pop3::Result<Self::Session>> + Send;
}

/// Connects to a POP3 server over TCP.
///
/// Without an explicit TLS setting, token credentials get implicit TLS and
/// password credentials get plaintext.
#[derive(Debug, Clone)]
pub struct Pop3Connector {
    host: String,
    port: u16,
    tls: Option<bool>,
    timeout: Duration,
}

impl Pop3Connector {
    /// Creates a connector.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
            timeout,
        }
    }

    /// Creates a connector for a configured endpoint.
    #[must_use]
    pub fn from_endpoint(endpoint: &Endpoint, timeout: Duration) -> Self {
        Self::new(&endpoint.host, endpoint.port, timeout).with_tls(endpoint.tls)
    }

    /// Forces TLS on or off; `None` restores the credential-based choice.
    #[must_use]
    pub const fn with_tls(mut self, tls: Option<bool>) -> Self {
        self.tls = tls;
        self
    }

    /// Session configuration for `credentials`.
    #[must_use]
    pub fn session_config(&self, credentials: &Credentials) -> Config {
        let security = if self.tls.unwrap_or_else(|| credentials.is_token()) {
            Security::Implicit
        } else {
            Security::None
        };

        Config::builder(&self.host)
            .security(security)
            .port(self.port)
            .timeout(self.timeout)
            .build()
    }
}

impl Connector for Pop3Connector {
    type Session = Session<Pop3Stream>;

    async fn connect(&self, credentials: &Credentials) -> mchat_pop3::Result<Self::Session> {
        let config = self.session_config(credentials);
        debug!(host = %self.host, port = self.port, security = ?config.security, "Opening POP3 session");
        Session::connect(&config).await
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

    #[test]
    fn test_tls_follows_credentials() {
        let connector = Pop3Connector::new("pop.example.com", 1995, Duration::from_secs(1));
        let token = Credentials::token("me", "tok");
        let password = Credentials::password("me", "pw");

        assert_eq!(connector.session_config(&token).security, Security::Implicit);
        assert_eq!(connector.session_config(&password).security, Security::None);
        assert_eq!(connector.session_config(&password).port, 1995);
    }

    #[test]
    fn test_tls_override() {
        let endpoint = Endpoint {
            host: "localhost".into(),
            port: 1110,
            tls: Some(false),
        };
        let connector = Pop3Connector::from_endpoint(&endpoint, Duration::from_secs(1));
        let token = Credentials::token("me", "tok");
        assert_eq!(connector.session_config(&token).security, Security::None);
    }
}
