//! Implementation for the connected (AUTHORIZATION) state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::Client;
use super::states::{Authenticated, Connected};
use crate::command::Command;
use crate::config::Config;
use crate::framed::FramedStream;
use crate::response::Response;
use crate::stream::{Pop3Stream, connect};
use crate::types::Credentials;
use crate::{Error, Result};
use mchat_oauth::sasl::{decode_challenge, xoauth2_response};

impl Client<Pop3Stream, Connected> {
    /// Opens the transport described by `config` and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` if the server cannot be reached or greets
    /// with anything but `+OK`, `Error::Timeout` past the deadline.
    pub async fn connect(config: &Config) -> Result<Self> {
        let stream = connect(config).await?;
        Self::from_stream(stream, config.timeout).await
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the single-line server greeting.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` if the greeting is not `+OK`.
    pub async fn from_stream(stream: S, timeout: std::time::Duration) -> Result<Self> {
        let mut framed = FramedStream::new(stream, timeout);

        let greeting = Response::parse(&framed.read_line().await?);
        if !greeting.is_ok() {
            let _ = framed.close().await;
            return Err(Error::Connect(format!("unexpected greeting: {greeting}")));
        }

        debug!(greeting = greeting.text(), "Connected");
        Ok(Self::with_stream(framed))
    }

    /// Authenticates with the credentials' mechanism.
    ///
    /// Consumes self and returns an authenticated client on success. On
    /// failure the session is aborted: `QUIT` is sent and the transport
    /// is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` if any step is answered negatively, or the
    /// transport error that interrupted the exchange.
    pub async fn authenticate(mut self, credentials: &Credentials) -> Result<Client<S, Authenticated>> {
        let outcome = match credentials {
            Credentials::Password { username, password } => {
                self.user_pass(username, password).await
            }
            Credentials::Token {
                username,
                access_token,
            } => self.xoauth2(username, access_token).await,
        };

        match outcome {
            Ok(()) => {
                debug!(user = credentials.username(), "Authenticated");
                Ok(self.transition())
            }
            Err(e) => {
                warn!(user = credentials.username(), error = %e, "Authentication failed");
                if let Err(quit_err) = self.quit().await {
                    debug!(error = %quit_err, "QUIT after failed authentication");
                }
                Err(e)
            }
        }
    }

    /// Authenticates with `USER` / `PASS`.
    ///
    /// # Errors
    ///
    /// See [`Client::authenticate`].
    pub async fn login(self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        self.authenticate(&Credentials::password(username, password))
            .await
    }

    /// Authenticates with `AUTH XOAUTH2`.
    ///
    /// # Errors
    ///
    /// See [`Client::authenticate`].
    pub async fn authenticate_xoauth2(
        self,
        username: &str,
        access_token: &str,
    ) -> Result<Client<S, Authenticated>> {
        self.authenticate(&Credentials::token(username, access_token))
            .await
    }

    async fn user_pass(&mut self, username: &str, password: &str) -> Result<()> {
        match self.command(&Command::User(username.to_string())).await? {
            Response::Ok(_) => {}
            other => return Err(Error::Auth(format!("USER rejected: {other}"))),
        }

        match self.command(&Command::Pass(password.to_string())).await? {
            Response::Ok(_) => Ok(()),
            other => Err(Error::Auth(format!("PASS rejected: {other}"))),
        }
    }

    async fn xoauth2(&mut self, username: &str, access_token: &str) -> Result<()> {
        match self.command(&Command::AuthXoauth2).await? {
            Response::Continue(_) => {}
            other => return Err(Error::Auth(format!("AUTH XOAUTH2 rejected: {other}"))),
        }

        let response = xoauth2_response(username, access_token);
        match self.command(&Command::SaslResponse(response)).await? {
            Response::Ok(_) => Ok(()),
            Response::Continue(payload) => {
                // The server reports token errors as a challenge and waits
                // for an empty line before sending the final -ERR.
                let detail = decode_challenge(&payload)
                    .map_or_else(|| payload.clone(), |c| format!("status {}", c.status));
                if let Err(e) = self.command(&Command::SaslResponse(String::new())).await {
                    debug!(error = %e, "Empty SASL reply after token challenge failed");
                }
                Err(Error::Auth(format!("token rejected: {detail}")))
            }
            other => Err(Error::Auth(format!("token rejected: {other}"))),
        }
    }
}
