//! Implementation for the authenticated (TRANSACTION) state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::Authenticated;
use crate::command::Command;
use crate::response::{Response, parse_list_count, parse_list_entry};
use crate::types::{MessageInfo, RawMessage};
use crate::{Error, Result};

/// Upper bound on the listing capacity reserved up front.
const MAX_PREALLOCATED_ENTRIES: usize = 1024;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists the messages in the maildrop.
    ///
    /// The count is the first token after `+OK`. Exactly that many
    /// `<id> <size>` lines follow, then the `.` terminator.
    ///
    /// # Errors
    ///
    /// Returns `Error::List` if the reply is negative or any line fails to
    /// parse. The command stream is out of sync afterwards.
    pub async fn list(&mut self) -> Result<Vec<MessageInfo>> {
        let text = match self.command(&Command::List).await? {
            Response::Ok(text) => text,
            other => return Err(Error::List(format!("rejected: {other}"))),
        };

        let count = parse_list_count(&text)
            .ok_or_else(|| Error::List(format!("unparsable message count: {text:?}")))?;

        // The count is server-supplied; entries are pushed as they arrive.
        let mut messages = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        for _ in 0..count {
            let line = self.stream.read_line().await?;
            let info = parse_list_entry(&line).ok_or_else(|| {
                Error::List(format!(
                    "unparsable entry: {:?}",
                    String::from_utf8_lossy(&line).trim_end()
                ))
            })?;
            messages.push(info);
        }

        let terminator = self.stream.read_line().await?;
        if crate::framed::trim_line(&terminator) != b"." {
            return Err(Error::List(format!(
                "expected terminator after {count} entries, got {:?}",
                String::from_utf8_lossy(&terminator).trim_end()
            )));
        }

        debug!(count, "Listed");
        Ok(messages)
    }

    /// Retrieves a message by number.
    ///
    /// # Errors
    ///
    /// Returns `Error::Retrieve` on `-ERR`, which leaves the session usable.
    /// A transport error or timeout while the body is read is fatal to the
    /// session.
    pub async fn retrieve(&mut self, id: u32) -> Result<RawMessage> {
        match self.command(&Command::Retr(id)).await? {
            Response::Ok(_) => {}
            Response::Err(text) => return Err(Error::Retrieve(format!("message {id}: {text}"))),
            other => {
                return Err(Error::Protocol(format!("unexpected RETR reply: {other}")));
            }
        }

        let body = self.stream.read_multiline().await?;
        debug!(id, bytes = body.len(), "Retrieved");
        Ok(RawMessage::new(body))
    }
}
