//! Type-state POP3 client connection.
//!
//! The client moves `Connected → Authenticated` and is consumed by `quit`.
//! Only an authenticated client exposes `list` and `retrieve`, so the
//! protocol order is checked at compile time.

mod authenticated;
mod connected;
mod states;

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::states::{Authenticated, Connected};
use crate::command::Command;
use crate::framed::FramedStream;
use crate::response::Response;
use crate::Result;

/// POP3 client connection with type-state.
///
/// The type parameter `State` tracks the protocol state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &std::any::type_name::<State>())
            .finish_non_exhaustive()
    }
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    const fn with_stream(stream: FramedStream<S>) -> Self {
        Self {
            stream,
            _state: PhantomData,
        }
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client::with_stream(self.stream)
    }

    /// Sends a command and reads its single-line reply.
    pub(crate) async fn command(&mut self, command: &Command) -> Result<Response> {
        debug!(command = ?command, "Sending");
        self.stream.write_line(&command.serialize()).await?;
        let reply = Response::parse(&self.stream.read_line().await?);
        debug!(command = command.name(), ok = reply.is_ok(), "Reply");
        Ok(reply)
    }

    /// Ends the session.
    ///
    /// Sends `QUIT` and reads the reply on a best-effort basis, then always
    /// shuts the transport down, even if the write or read failed.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered. The connection is closed
    /// regardless.
    pub async fn quit(mut self) -> Result<()> {
        debug!("Quitting");
        let exchange = self.command(&Command::Quit).await;
        let closed = self.stream.close().await;

        match exchange {
            Ok(Response::Ok(_)) => closed,
            Ok(other) => {
                debug!(reply = %other, "QUIT not acknowledged");
                closed
            }
            Err(e) => Err(e),
        }
    }
}
