//! One-shot submission: connect, secure, authenticate, deliver, quit.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::client::{Client, Connected};
use crate::config::{Config, Security};
use crate::error::{Error, Result};
use crate::stream::connect;
use crate::types::{Address, Credentials};

/// Submits `message` to `recipients` through the server in `config`.
///
/// `STARTTLS` configurations refuse to continue in plaintext when the
/// server does not offer the upgrade.
///
/// # Errors
///
/// Returns the first failing step. `Error::InvalidAddress` if there are no
/// recipients.
pub async fn send_mail(
    config: &Config,
    credentials: &Credentials,
    from: &Address,
    recipients: &[Address],
    message: &[u8],
) -> Result<()> {
    if recipients.is_empty() {
        return Err(Error::InvalidAddress("no recipients".into()));
    }

    let stream = connect(config).await?;
    let client = Client::from_stream(stream, config.timeout)
        .await?
        .ehlo(&config.client_hostname)
        .await?;

    let client = if config.security == Security::StartTls {
        client.starttls(&config.host, &config.client_hostname).await?
    } else {
        client
    };

    submit(client, credentials, from, recipients, message).await?;
    info!(to = recipients.len(), bytes = message.len(), "Message submitted");
    Ok(())
}

/// Authenticates and delivers one message on a client that has already
/// greeted with `EHLO`, then quits.
///
/// A failed `QUIT` after the server accepted the message is not an error.
///
/// # Errors
///
/// Returns the authentication or transaction failure.
pub async fn submit<S>(
    client: Client<S, Connected>,
    credentials: &Credentials,
    from: &Address,
    recipients: &[Address],
    message: &[u8],
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some((first, rest)) = recipients.split_first() else {
        return Err(Error::InvalidAddress("no recipients".into()));
    };

    let client = client.authenticate(credentials).await?;
    let mut client = client
        .mail_from(from.clone())
        .await?
        .rcpt_to(first.clone())
        .await?;
    for recipient in rest {
        client = client.rcpt_to(recipient.clone()).await?;
    }
    let client = client.data().await?.send_message(message).await?;

    if let Err(e) = client.quit().await {
        debug!(error = %e, "QUIT after delivery");
    }
    Ok(())
}
