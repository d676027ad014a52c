//! Runtime POP3 session state machine.
//!
//! `Session` wraps the type-state [`Client`] for callers that keep one
//! session value across calls. The protocol order is then enforced at run
//! time: out-of-order calls return `Error::InvalidState` instead of
//! reaching the wire.
//!
//! ```text
//! Connected ──authenticate──▶ Authenticated ──list/retrieve──▶ Authenticated
//!     │                           │ fatal error
//!     │ auth failure              ▼
//!     ▼                         Broken
//!   Closed ◀────────quit────────────┘
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::client::{Authenticated, Client, Connected};
use crate::config::Config;
use crate::stream::Pop3Stream;
use crate::types::{Credentials, MessageInfo, RawMessage};
use crate::{Error, Result};

enum SessionState<S> {
    Connected(Client<S, Connected>),
    Authenticated(Client<S, Authenticated>),
    /// A fatal error desynchronized the stream; only `quit` is accepted.
    Broken(Client<S, Authenticated>),
    Closed,
}

impl<S> SessionState<S> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::Authenticated(_) => "authenticated",
            Self::Broken(_) => "broken",
            Self::Closed => "closed",
        }
    }
}

/// One POP3 session, from greeting to `QUIT`.
pub struct Session<S = Pop3Stream> {
    state: SessionState<S>,
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state.name())
            .finish()
    }
}

impl Session<Pop3Stream> {
    /// Connects to the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` or `Error::Timeout` if no session could be
    /// established.
    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(Client::connect(config).await?))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a freshly connected client.
    #[must_use]
    pub const fn new(client: Client<S, Connected>) -> Self {
        Self {
            state: SessionState::Connected(client),
        }
    }

    /// Reads the greeting from an already open stream.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` if the greeting is negative.
    pub async fn from_stream(stream: S, timeout: Duration) -> Result<Self> {
        Ok(Self::new(Client::from_stream(stream, timeout).await?))
    }

    /// Returns the current state name.
    #[must_use]
    pub const fn state(&self) -> &'static str {
        self.state.name()
    }

    /// Returns true if the session can accept further commands.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected(_) | SessionState::Authenticated(_)
        )
    }

    /// Authenticates. Valid once, right after connecting.
    ///
    /// On failure the session is closed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` when not in the connected state,
    /// otherwise the authentication failure.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Connected(client) => {
                let client = client.authenticate(credentials).await?;
                self.state = SessionState::Authenticated(client);
                Ok(())
            }
            other => {
                let name = other.name();
                self.state = other;
                Err(Error::InvalidState(format!("authenticate while {name}")))
            }
        }
    }

    /// Lists the maildrop.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless authenticated. A `List` error
    /// breaks the session.
    pub async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        let client = self.authenticated("list")?;
        let result = client.list().await;
        self.settle(result)
    }

    /// Retrieves one message.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless authenticated. `Error::Retrieve`
    /// keeps the session usable; transport errors break it.
    pub async fn retrieve(&mut self, id: u32) -> Result<RawMessage> {
        let client = self.authenticated("retrieve")?;
        let result = client.retrieve(id).await;
        self.settle(result)
    }

    /// Ends the session and closes the transport.
    ///
    /// Closing an already closed session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the `QUIT` exchange failure. The transport is closed either way.
    pub async fn quit(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Connected(client) => client.quit().await,
            SessionState::Authenticated(client) | SessionState::Broken(client) => {
                client.quit().await
            }
            SessionState::Closed => Ok(()),
        }
    }

    fn authenticated(&mut self, operation: &str) -> Result<&mut Client<S, Authenticated>> {
        match &mut self.state {
            SessionState::Authenticated(client) => Ok(client),
            other => Err(Error::InvalidState(format!(
                "{operation} while {}",
                other.name()
            ))),
        }
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_session_fatal()
            && let SessionState::Authenticated(client) =
                std::mem::replace(&mut self.state, SessionState::Closed)
        {
            debug!(error = %e, "Session broken");
            self.state = SessionState::Broken(client);
        }
        result
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

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_list_before_authenticate_is_rejected() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let mut session = Session::from_stream(mock, TIMEOUT).await.unwrap();

        assert!(matches!(session.list().await, Err(Error::InvalidState(_))));
        assert!(matches!(session.retrieve(1).await, Err(Error::InvalidState(_))));
        assert_eq!(session.state(), "connected");
        assert!(session.is_usable());
    }

    #[tokio::test]
    async fn test_authenticate_twice_is_rejected() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK locked\r\n")
            .build();
        let mut session = Session::from_stream(mock, TIMEOUT).await.unwrap();
        let creds = Credentials::password("bob", "pw");

        session.authenticate(&creds).await.unwrap();
        assert!(matches!(
            session.authenticate(&creds).await,
            Err(Error::InvalidState(_))
        ));
        assert_eq!(session.state(), "authenticated");
    }

    #[tokio::test]
    async fn test_malformed_list_breaks_session_and_quit_still_runs() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK\r\n")
            .write(b"LIST\r\n")
            .read(b"+OK lots of messages\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();
        let mut session = Session::from_stream(mock, TIMEOUT).await.unwrap();
        session
            .authenticate(&Credentials::password("bob", "pw"))
            .await
            .unwrap();

        assert!(matches!(session.list().await, Err(Error::List(_))));
        assert!(!session.is_usable());
        assert!(matches!(session.retrieve(1).await, Err(Error::InvalidState(_))));

        session.quit().await.unwrap();
        assert_eq!(session.state(), "closed");
        session.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_retrieve_err_keeps_session_usable() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK\r\n")
            .write(b"RETR 9\r\n")
            .read(b"-ERR no such message\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK 5 octets\r\nhello\r\n.\r\n")
            .build();
        let mut session = Session::from_stream(mock, TIMEOUT).await.unwrap();
        session
            .authenticate(&Credentials::password("bob", "pw"))
            .await
            .unwrap();

        assert!(matches!(session.retrieve(9).await, Err(Error::Retrieve(_))));
        assert!(session.is_usable());
        assert_eq!(session.retrieve(1).await.unwrap().as_bytes(), b"hello\r\n");
    }

    #[tokio::test]
    async fn test_auth_failure_closes_session() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER bob\r\n")
            .read(b"-ERR unknown user\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK\r\n")
            .build();
        let mut session = Session::from_stream(mock, TIMEOUT).await.unwrap();

        let err = session
            .authenticate(&Credentials::password("bob", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!session.is_usable());
        assert!(matches!(session.list().await, Err(Error::InvalidState(_))));
    }
}
