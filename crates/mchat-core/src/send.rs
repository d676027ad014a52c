//! Outbound chat messages.

use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use mchat_mime::date::format_date;
use mchat_smtp::{Address, Security};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Endpoint;
use crate::credentials::CredentialProvider;
use crate::model::{Message, MessageStatus};
use crate::processor::MCHAT_ID_HEADER;
use crate::store::MessageStore;
use crate::sync::LocalIds;

/// Subject line of every message mchat sends.
pub const SUBJECT: &str = "Notification from MChat";

const ID_DOMAIN: &str = "mchat.mchat";

/// Delivers a composed message.
pub trait Submitter: Send + Sync {
    /// Submits `message` from `from` to `to`.
    fn submit(
        &self,
        credentials: &mchat_pop3::Credentials,
        from: &Address,
        to: &Address,
        message: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Submits over SMTP.
///
/// Without an explicit TLS setting, token credentials get `STARTTLS` and
/// password credentials get plaintext. Forcing TLS on port 465 uses
/// implicit TLS.
#[derive(Debug, Clone)]
pub struct SmtpSubmitter {
    host: String,
    port: u16,
    tls: Option<bool>,
    timeout: Duration,
}

impl SmtpSubmitter {
    /// Creates a submitter for a configured endpoint.
    #[must_use]
    pub fn from_endpoint(endpoint: &Endpoint, timeout: Duration) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            tls: endpoint.tls,
            timeout,
        }
    }

    /// Client configuration for `credentials`.
    #[must_use]
    pub fn smtp_config(&self, credentials: &mchat_pop3::Credentials) -> mchat_smtp::Config {
        let security = match self.tls {
            Some(true) if self.port == Security::Implicit.default_port() => Security::Implicit,
            Some(true) => Security::StartTls,
            Some(false) => Security::None,
            None if credentials.is_token() => Security::StartTls,
            None => Security::None,
        };

        mchat_smtp::Config::builder(&self.host)
            .port(self.port)
            .security(security)
            .timeout(self.timeout)
            .build()
    }
}

impl Submitter for SmtpSubmitter {
    async fn submit(
        &self,
        credentials: &mchat_pop3::Credentials,
        from: &Address,
        to: &Address,
        message: &[u8],
    ) -> Result<()> {
        let config = self.smtp_config(credentials);
        debug!(host = %config.host, port = config.port, security = ?config.security, "Submitting");
        mchat_smtp::send_mail(
            &config,
            &smtp_credentials(credentials),
            from,
            std::slice::from_ref(to),
            message,
        )
        .await?;
        Ok(())
    }
}

/// Converts mailbox credentials into submission credentials.
#[must_use]
pub fn smtp_credentials(credentials: &mchat_pop3::Credentials) -> mchat_smtp::Credentials {
    match credentials {
        mchat_pop3::Credentials::Password { username, password } => {
            mchat_smtp::Credentials::password(username, password)
        }
        mchat_pop3::Credentials::Token {
            username,
            access_token,
        } => mchat_smtp::Credentials::token(username, access_token),
    }
}

/// Builds the `X-MCHAT-ID` value for a message sent at `date`.
#[must_use]
pub fn message_id(date: &DateTime<Utc>) -> String {
    format!(
        "<{}@{ID_DOMAIN}>",
        date.timestamp_nanos_opt().unwrap_or_default()
    )
}

/// Renders a plain-text chat message.
#[must_use]
pub fn compose(from: &str, to: &str, text: &str, id: &str, date: &DateTime<Utc>) -> Vec<u8> {
    let mut out = String::with_capacity(text.len() + 256);
    let _ = write!(out, "From: {from}\r\n");
    let _ = write!(out, "To: {to}\r\n");
    let _ = write!(out, "Date: {}\r\n", format_date(date));
    let _ = write!(out, "Subject: {SUBJECT}\r\n");
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
    let _ = write!(out, "{MCHAT_ID_HEADER}: {id}\r\n");
    out.push_str("\r\n");
    out.push_str(text);
    out.push_str("\r\n");
    out.into_bytes()
}

/// Sends chat messages as the configured account.
pub struct SendService<T, P, M> {
    submitter: T,
    credentials: P,
    store: M,
    local_ids: LocalIds,
    from: String,
}

impl<T, P, M> std::fmt::Debug for SendService<T, P, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendService")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl<T, P, M> SendService<T, P, M>
where
    T: Submitter,
    P: CredentialProvider,
    M: MessageStore,
{
    /// Creates the service for account `from`.
    pub fn new(submitter: T, credentials: P, store: M, local_ids: LocalIds, from: impl Into<String>) -> Self {
        Self {
            submitter,
            credentials,
            store,
            local_ids,
            from: from.into(),
        }
    }

    /// Sends `text` to `to`.
    ///
    /// A delivered message is saved and its id registered so the engine
    /// does not ingest it again. A failed one is returned with
    /// [`MessageStatus::Failed`] and is not saved.
    pub async fn send(&self, to: &str, text: &str) -> Message {
        let now = Utc::now();
        let date = now.trunc_subsecs(0);
        let id = message_id(&now);
        let to = to.trim();

        let mut message = Message {
            id: id.clone(),
            from: self.from.clone(),
            to: to.to_string(),
            contact: to.to_string(),
            chat_address: to.to_string(),
            content: text.to_string(),
            date: Some(date),
            status: MessageStatus::Pending,
        };

        let raw = compose(&self.from, to, text, &id, &date);
        match self.deliver(to, &raw).await {
            Ok(()) => {
                message.status = MessageStatus::Delivered;
                if let Err(e) = self.store.save(&message).await {
                    warn!(%id, error = %e, "Failed to persist sent message");
                }
                self.local_ids.register(id);
                info!(to, "Message sent");
            }
            Err(e) => {
                message.status = MessageStatus::Failed;
                warn!(to, error = %e, "Send failed");
            }
        }
        message
    }

    async fn deliver(&self, to: &str, raw: &[u8]) -> Result<()> {
        let from = Address::new(&self.from)?;
        let to = Address::new(to)?;
        let credentials = self.credentials.credentials().await?;
        self.submitter.submit(&credentials, &from, &to, raw).await
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
    use crate::Error;
    use crate::processor;
    use crate::store::SqliteStore;
    use chrono::TimeZone;
    use std::future::ready;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeSubmitter {
        fail: bool,
        sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl Submitter for FakeSubmitter {
        fn submit(
            &self,
            _credentials: &mchat_pop3::Credentials,
            _from: &Address,
            to: &Address,
            message: &[u8],
        ) -> impl Future<Output = Result<()>> + Send {
            let result = if self.fail {
                Err(Error::Smtp(mchat_smtp::Error::SmtpError {
                    code: 550,
                    message: "mailbox unavailable".into(),
                }))
            } else {
                self.sent
                    .lock()
                    .unwrap()
                    .push((to.as_str().to_string(), message.to_vec()));
                Ok(())
            };
            ready(result)
        }
    }

    struct StaticCredentials;

    impl CredentialProvider for StaticCredentials {
        fn credentials(&self) -> impl Future<Output = Result<mchat_pop3::Credentials>> + Send {
            ready(Ok(mchat_pop3::Credentials::token("me@gmail.com", "tok")))
        }
    }

    async fn service(
        submitter: FakeSubmitter,
    ) -> (
        SendService<FakeSubmitter, StaticCredentials, SqliteStore>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = SqliteStore::in_memory().await.unwrap();
        let service = SendService::new(submitter, StaticCredentials, store, LocalIds::new(tx), "me@gmail.com");
        (service, rx)
    }

    #[test]
    fn test_compose_headers() {
        let date = Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap();
        let raw = compose("me@gmail.com", "bob@example.com", "hi bob", "<1@mchat.mchat>", &date);
        let text = String::from_utf8(raw).unwrap();

        assert!(text.starts_with("From: me@gmail.com\r\nTo: bob@example.com\r\n"));
        assert!(text.contains(&format!("Date: {}\r\n", format_date(&date))));
        assert!(text.contains("Jan 2006 22:04:05 +0000"));
        assert!(text.contains("Subject: Notification from MChat\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=\"utf-8\"\r\n"));
        assert!(text.contains("X-MCHAT-ID: <1@mchat.mchat>\r\n\r\nhi bob\r\n"));
    }

    #[test]
    fn test_composed_message_ingests_as_outbound() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let id = message_id(&date);
        let message = processor::process(&compose("me@gmail.com", "bob@example.com", "ping", &id, &date));

        assert_eq!(message.id, id);
        assert_eq!(message.chat_address, "bob@example.com");
        assert_eq!(message.content, "ping\r\n");
        assert_eq!(message.date, Some(date));
    }

    #[test]
    fn test_message_id_format() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(message_id(&date), "<1714564800000000000@mchat.mchat>");
    }

    #[test]
    fn test_security_choice() {
        let token = mchat_pop3::Credentials::token("me", "tok");
        let password = mchat_pop3::Credentials::password("me", "pw");
        let mut endpoint = Endpoint::new("smtp.gmail.com", 587);

        let submitter = SmtpSubmitter::from_endpoint(&endpoint, Duration::from_secs(1));
        assert_eq!(submitter.smtp_config(&token).security, Security::StartTls);
        assert_eq!(submitter.smtp_config(&password).security, Security::None);

        endpoint.port = 465;
        endpoint.tls = Some(true);
        let submitter = SmtpSubmitter::from_endpoint(&endpoint, Duration::from_secs(1));
        assert_eq!(submitter.smtp_config(&password).security, Security::Implicit);
    }

    #[tokio::test]
    async fn test_delivered_is_saved_and_registered() {
        let submitter = FakeSubmitter::default();
        let sent = Arc::clone(&submitter.sent);
        let (service, mut rx) = service(submitter).await;

        let message = service.send("bob@example.com", "hello").await;
        assert_eq!(message.status, MessageStatus::Delivered);
        assert_eq!(message.chat_address, "bob@example.com");

        assert_eq!(rx.try_recv().unwrap(), message.id);
        let stored = service.store.load_all().await.unwrap();
        assert_eq!(stored, vec![message.clone()]);

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].0, "bob@example.com");
        assert!(String::from_utf8_lossy(&sent[0].1).contains(&message.id));
    }

    #[tokio::test]
    async fn test_failed_is_not_saved() {
        let (service, mut rx) = service(FakeSubmitter {
            fail: true,
            ..FakeSubmitter::default()
        })
        .await;

        let message = service.send("bob@example.com", "hello").await;
        assert_eq!(message.status, MessageStatus::Failed);
        assert!(rx.try_recv().is_err());
        assert!(service.store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails() {
        let (service, _rx) = service(FakeSubmitter::default()).await;
        let message = service.send("not an address", "hello").await;
        assert_eq!(message.status, MessageStatus::Failed);
    }
}
