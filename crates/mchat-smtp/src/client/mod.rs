//! Type-state SMTP client.
//!
//! ```text
//! Connected ── ehlo/starttls ──▶ Connected ── authenticate ──▶ Authenticated
//!     │                                                            │
//!     └──────────────── mail_from ◀────────────────────────────────┘
//!                          ▼
//!                    MailTransaction ── rcpt_to ──▶ RecipientAdded ── data ──▶ Data
//!                                                                              │
//!                          Connected ◀────────── send_message ─────────────────┘
//! ```

mod connected;
mod states;
mod transaction;

use std::collections::HashSet;
use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::states::{Authenticated, Connected, Data, MailTransaction, RecipientAdded};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::framed::FramedStream;
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};

/// Server capabilities from the greeting and `EHLO` reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// SMTP client with type-state pattern.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &std::any::type_name::<State>())
            .field("server", &self.server_info.hostname)
            .finish_non_exhaustive()
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server information.
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        debug!(command = ?cmd, "Sending");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = self.stream.read_reply().await?;
        debug!(code = %reply.code, "Reply");
        Ok(reply)
    }

    /// Sends a command and requires a 2xx reply.
    async fn expect_success(&mut self, cmd: &Command) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(reply)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// The transport is shut down even if the exchange fails.
    ///
    /// # Errors
    ///
    /// Returns the transport failure or a reply other than 2xx/221.
    pub async fn quit(mut self) -> Result<()> {
        let exchange = self.send_command(&Command::Quit).await;
        self.stream.shutdown().await;

        let reply = exchange?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(())
    }
}
