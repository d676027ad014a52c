//! Mailbox polling and ingestion.
//!
//! [`SyncEngine`] owns the known-id set. Each cycle opens one session,
//! pulls everything listed, turns new messages into chat [`Message`]s,
//! saves them and broadcasts them to subscribers. A retrieval that breaks
//! the session is followed by a reconnect, and the listing resumes at the
//! next message.
//!
//! ```text
//! credentials ─▶ connect ─▶ authenticate ─▶ LIST ─▶ RETR × n ─▶ QUIT
//!                                                    │
//!                                     process ─▶ dedup ─▶ save ─▶ emit
//! ```

mod connector;
mod state;

pub use connector::{Connector, MailDrop, Pop3Connector};
pub use state::{CycleReport, IngestState, LocalIds};

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::Result;
use crate::credentials::CredentialProvider;
use crate::model::Message;
use crate::processor;
use crate::store::MessageStore;

/// Polls a mailbox and publishes new chat messages.
///
/// Subscribers that fall behind by more than the channel capacity lose the
/// oldest messages and see `RecvError::Lagged`; the store still has them.
pub struct SyncEngine<C, P, M> {
    connector: C,
    credentials: P,
    store: M,
    state: IngestState,
    events: broadcast::Sender<Message>,
    local_tx: mpsc::UnboundedSender<String>,
    local_rx: mpsc::UnboundedReceiver<String>,
    interval: Duration,
}

impl<C, P, M> std::fmt::Debug for SyncEngine<C, P, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("known", &self.state.len())
            .field("subscribers", &self.events.receiver_count())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl<C, P, M> SyncEngine<C, P, M>
where
    C: Connector,
    P: CredentialProvider,
    M: MessageStore,
{
    /// Creates an engine. A zero `capacity` is raised to one.
    #[must_use]
    pub fn new(connector: C, credentials: P, store: M, interval: Duration, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            credentials,
            store,
            state: IngestState::new(),
            events,
            local_tx,
            local_rx,
            interval,
        }
    }

    /// Subscribes to newly ingested messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.events.subscribe()
    }

    /// Handle for registering locally sent message ids.
    #[must_use]
    pub fn local_ids(&self) -> LocalIds {
        LocalIds::new(self.local_tx.clone())
    }

    /// The backing store.
    pub const fn store(&self) -> &M {
        &self.store
    }

    /// Ids ingested so far.
    pub const fn state(&self) -> &IngestState {
        &self.state
    }

    /// Seeds the known-id set from the store and emits every stored message.
    ///
    /// Returns the number of stored messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn bootstrap(&mut self) -> Result<usize> {
        let messages = self.store.load_all().await?;
        let count = messages.len();
        for message in messages {
            if self.state.insert(message.id.clone()) {
                self.emit(message);
            }
        }
        info!(count, "Loaded stored messages");
        Ok(count)
    }

    /// Runs one fetch cycle.
    ///
    /// The session is always closed before returning.
    ///
    /// # Errors
    ///
    /// Returns the credential, connection, authentication or listing
    /// failure that aborted the cycle. Per-message failures are counted in
    /// the report instead.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.adopt_local_ids();

        let credentials = self.credentials.credentials().await?;
        let mut session = self.connector.connect(&credentials).await?;

        let result = self.ingest(&mut session, &credentials).await;
        if let Err(e) = session.quit().await {
            debug!(error = %e, "QUIT failed");
        }

        let report = result?;
        info!(%report, "Fetch cycle complete");
        Ok(report)
    }

    /// Runs cycles forever, one per interval tick.
    ///
    /// A tick that comes due while a cycle is still running is skipped.
    pub async fn run(&mut self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "Fetch cycle failed");
            }
        }
    }

    fn adopt_local_ids(&mut self) {
        while let Ok(id) = self.local_rx.try_recv() {
            debug!(%id, "Adopted local id");
            self.state.insert(id);
        }
    }

    async fn ingest(
        &mut self,
        session: &mut C::Session,
        credentials: &mchat_pop3::Credentials,
    ) -> Result<CycleReport> {
        session.authenticate(credentials).await?;
        let listing = session.list().await?;

        let mut report = CycleReport {
            listed: listing.len(),
            ..CycleReport::default()
        };

        for info in listing {
            let raw = match session.retrieve(info.id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(id = info.id, error = %e, "Retrieve failed");
                    report.failed += 1;
                    if !session.is_usable() {
                        match self.reopen(session, credentials).await {
                            Ok(fresh) => *session = fresh,
                            Err(e) => {
                                warn!(error = %e, "Reconnect failed, abandoning the rest of the listing");
                                break;
                            }
                        }
                    }
                    continue;
                }
            };

            let message = processor::process(raw.as_bytes());
            if !self.state.insert(message.id.clone()) {
                report.duplicates += 1;
                continue;
            }

            if let Err(e) = self.store.save(&message).await {
                warn!(id = %message.id, error = %e, "Failed to persist message");
            }
            debug!(id = %message.id, chat = %message.chat_address, "New message");
            self.emit(message);
            report.new += 1;
        }

        Ok(report)
    }

    /// Closes a broken session and opens an authenticated replacement.
    ///
    /// Message numbers stay valid across sessions, so the listing from the
    /// first session can be resumed.
    async fn reopen(
        &self,
        broken: &mut C::Session,
        credentials: &mchat_pop3::Credentials,
    ) -> mchat_pop3::Result<C::Session> {
        if let Err(e) = broken.quit().await {
            debug!(error = %e, "QUIT on broken session failed");
        }
        debug!("Reconnecting to resume the listing");
        let mut fresh = self.connector.connect(credentials).await?;
        if let Err(e) = fresh.authenticate(credentials).await {
            if let Err(quit_err) = fresh.quit().await {
                debug!(error = %quit_err, "QUIT after failed reconnect");
            }
            return Err(e);
        }
        Ok(fresh)
    }

    fn emit(&self, message: Message) {
        if self.events.send(message).is_err() {
            debug!("No subscribers");
        }
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
    use crate::model::MessageStatus;
    use crate::store::SqliteStore;
    use mchat_pop3::{Credentials, MessageInfo, RawMessage};
    use std::future::{Future, ready};
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast::error::TryRecvError;

    enum Entry {
        Ok(Vec<u8>),
        Rejected,
        Dropped,
    }

    #[derive(Default)]
    struct Mailbox {
        entries: Vec<Entry>,
        malformed_list: bool,
        reject_auth: bool,
        max_connects: Option<usize>,
        connects: usize,
        log: Vec<String>,
    }

    type Shared = Arc<Mutex<Mailbox>>;

    struct FakeDrop {
        mailbox: Shared,
        usable: bool,
        closed: bool,
    }

    impl FakeDrop {
        fn record(&self, command: impl Into<String>) {
            self.mailbox.lock().unwrap().log.push(command.into());
        }
    }

    impl MailDrop for FakeDrop {
        fn authenticate(
            &mut self,
            _credentials: &Credentials,
        ) -> impl Future<Output = mchat_pop3::Result<()>> + Send {
            self.record("AUTH");
            let result = if self.mailbox.lock().unwrap().reject_auth {
                self.usable = false;
                Err(mchat_pop3::Error::Auth("bad password".into()))
            } else {
                Ok(())
            };
            ready(result)
        }

        fn list(&mut self) -> impl Future<Output = mchat_pop3::Result<Vec<MessageInfo>>> + Send {
            self.record("LIST");
            let mailbox = self.mailbox.lock().unwrap();
            let result = if mailbox.malformed_list {
                Err(mchat_pop3::Error::List("unparsable message count".into()))
            } else {
                Ok((1..=mailbox.entries.len())
                    .map(|id| MessageInfo {
                        id: u32::try_from(id).unwrap(),
                        size: 100,
                    })
                    .collect())
            };
            drop(mailbox);
            if result.is_err() {
                self.usable = false;
            }
            ready(result)
        }

        fn retrieve(&mut self, id: u32) -> impl Future<Output = mchat_pop3::Result<RawMessage>> + Send {
            self.record(format!("RETR {id}"));
            let mailbox = self.mailbox.lock().unwrap();
            let result = match &mailbox.entries[id as usize - 1] {
                Entry::Ok(raw) => Ok(RawMessage::from(raw.clone())),
                Entry::Rejected => Err(mchat_pop3::Error::Retrieve(format!("message {id}: gone"))),
                Entry::Dropped => Err(mchat_pop3::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset by peer",
                ))),
            };
            drop(mailbox);
            if result.as_ref().is_err_and(mchat_pop3::Error::is_session_fatal) {
                self.usable = false;
            }
            ready(result)
        }

        fn quit(&mut self) -> impl Future<Output = mchat_pop3::Result<()>> + Send {
            if !self.closed {
                self.record("QUIT");
                self.closed = true;
            }
            self.usable = false;
            ready(Ok(()))
        }

        fn is_usable(&self) -> bool {
            self.usable
        }
    }

    struct FakeConnector(Shared);

    impl Connector for FakeConnector {
        type Session = FakeDrop;

        fn connect(
            &self,
            _credentials: &Credentials,
        ) -> impl Future<Output = mchat_pop3::Result<FakeDrop>> + Send {
            let mut mailbox = self.0.lock().unwrap();
            if mailbox.max_connects.is_some_and(|max| mailbox.connects >= max) {
                return ready(Err(mchat_pop3::Error::Connect("connection refused".into())));
            }
            mailbox.connects += 1;
            drop(mailbox);
            ready(Ok(FakeDrop {
                mailbox: Arc::clone(&self.0),
                usable: true,
                closed: false,
            }))
        }
    }

    struct StaticCredentials;

    impl CredentialProvider for StaticCredentials {
        fn credentials(&self) -> impl Future<Output = Result<Credentials>> + Send {
            ready(Ok(Credentials::password("me@example.com", "pw")))
        }
    }

    struct FailingStore;

    impl MessageStore for FailingStore {
        fn save(&self, _message: &Message) -> impl Future<Output = Result<bool>> + Send {
            ready(Err(Error::Config("disk full".into())))
        }

        fn load_all(&self) -> impl Future<Output = Result<Vec<Message>>> + Send {
            ready(Ok(Vec::new()))
        }

        fn update_status(
            &self,
            _id: &str,
            _status: MessageStatus,
        ) -> impl Future<Output = Result<()>> + Send {
            ready(Ok(()))
        }
    }

    fn raw(id: &str, body: &str) -> Vec<u8> {
        format!(
            "Delivered-To: me@example.com\r\n\
From: Alice <alice@example.com>\r\n\
To: me@example.com\r\n\
Message-ID: {id}\r\n\
Date: Mon, 2 Jan 2006 15:04:05 +0000\r\n\
\r\n\
{body}\r\n"
        )
        .into_bytes()
    }

    fn mailbox(entries: Vec<Entry>) -> Shared {
        Arc::new(Mutex::new(Mailbox {
            entries,
            ..Mailbox::default()
        }))
    }

    fn log(mailbox: &Shared) -> Vec<String> {
        std::mem::take(&mut mailbox.lock().unwrap().log)
    }

    async fn engine(mailbox: &Shared) -> SyncEngine<FakeConnector, StaticCredentials, SqliteStore> {
        SyncEngine::new(
            FakeConnector(Arc::clone(mailbox)),
            StaticCredentials,
            SqliteStore::in_memory().await.unwrap(),
            Duration::from_secs(15),
            16,
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(message) => out.push(message),
                Err(TryRecvError::Empty) => return out,
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_second_cycle_emits_nothing() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<1@x>", "hi")), Entry::Ok(raw("<2@x>", "there"))]);
        let mut engine = engine(&mailbox).await;
        let mut rx = engine.subscribe();

        let first = engine.run_cycle().await.unwrap();
        assert_eq!(first.new, 2);
        assert_eq!(drain(&mut rx).len(), 2);

        let second = engine.run_cycle().await.unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.duplicates, 2);
        assert!(drain(&mut rx).is_empty());

        assert_eq!(engine.store().load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_retrieve_is_isolated_and_retried() {
        let mailbox = mailbox(vec![Entry::Rejected, Entry::Ok(raw("<2@x>", "second"))]);
        let mut engine = engine(&mailbox).await;
        let mut rx = engine.subscribe();

        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.listed, report.new, report.failed), (2, 1, 1));
        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].id, "<2@x>");
        assert_eq!(emitted[0].content, "second\r\n");
        assert_eq!(log(&mailbox), ["AUTH", "LIST", "RETR 1", "RETR 2", "QUIT"]);

        mailbox.lock().unwrap().entries[0] = Entry::Ok(raw("<1@x>", "first"));
        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.new, report.duplicates), (1, 1));
        assert_eq!(drain(&mut rx)[0].id, "<1@x>");
    }

    #[tokio::test]
    async fn test_malformed_list_quits_without_retrieving() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<1@x>", "hi"))]);
        mailbox.lock().unwrap().malformed_list = true;
        let mut engine = engine(&mailbox).await;

        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Pop3(mchat_pop3::Error::List(_))));
        assert_eq!(log(&mailbox), ["AUTH", "LIST", "QUIT"]);
    }

    #[tokio::test]
    async fn test_connection_loss_reconnects_and_resumes_listing() {
        let mailbox = mailbox(vec![Entry::Dropped, Entry::Ok(raw("<2@x>", "still here"))]);
        let mut engine = engine(&mailbox).await;
        let mut rx = engine.subscribe();

        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.listed, report.new, report.failed), (2, 1, 1));
        assert_eq!(
            log(&mailbox),
            ["AUTH", "LIST", "RETR 1", "QUIT", "AUTH", "RETR 2", "QUIT"]
        );
        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].id, "<2@x>");
        assert!(!engine.state().contains("<1@x>"));
    }

    #[tokio::test]
    async fn test_failed_reconnect_abandons_listing() {
        let mailbox = mailbox(vec![Entry::Dropped, Entry::Ok(raw("<2@x>", "later"))]);
        mailbox.lock().unwrap().max_connects = Some(1);
        let mut engine = engine(&mailbox).await;

        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.listed, report.new, report.failed), (2, 0, 1));
        assert_eq!(log(&mailbox), ["AUTH", "LIST", "RETR 1", "QUIT"]);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_cycle() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<1@x>", "hi"))]);
        mailbox.lock().unwrap().reject_auth = true;
        let mut engine = engine(&mailbox).await;

        assert!(matches!(
            engine.run_cycle().await,
            Err(Error::Pop3(mchat_pop3::Error::Auth(_)))
        ));
        assert_eq!(log(&mailbox), ["AUTH", "QUIT"]);

        mailbox.lock().unwrap().reject_auth = false;
        assert_eq!(engine.run_cycle().await.unwrap().new, 1);
    }

    #[tokio::test]
    async fn test_persist_failure_still_emits() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<1@x>", "hi"))]);
        let mut engine = SyncEngine::new(
            FakeConnector(Arc::clone(&mailbox)),
            StaticCredentials,
            FailingStore,
            Duration::from_secs(15),
            16,
        );
        let mut rx = engine.subscribe();

        assert_eq!(engine.run_cycle().await.unwrap().new, 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_local_ids_are_not_reemitted() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<sent@mchat.mchat>", "mine")), Entry::Ok(raw("<2@x>", "theirs"))]);
        let mut engine = engine(&mailbox).await;
        let mut rx = engine.subscribe();

        engine.local_ids().register("<sent@mchat.mchat>");
        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.new, report.duplicates), (1, 1));

        let emitted = drain(&mut rx);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].id, "<2@x>");
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_and_emits_stored() {
        let mailbox = mailbox(vec![Entry::Ok(raw("<1@x>", "hi"))]);
        let mut engine = engine(&mailbox).await;
        engine
            .store()
            .save(&processor::process(&raw("<1@x>", "hi")))
            .await
            .unwrap();
        let mut rx = engine.subscribe();

        assert_eq!(engine.bootstrap().await.unwrap(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(engine.state().contains("<1@x>"));

        let report = engine.run_cycle().await.unwrap();
        assert_eq!((report.new, report.duplicates), (0, 1));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_oldest() {
        let entries = (0..4).map(|i| Entry::Ok(raw(&format!("<{i}@x>"), "m"))).collect();
        let mailbox = mailbox(entries);
        let mut engine = SyncEngine::new(
            FakeConnector(Arc::clone(&mailbox)),
            StaticCredentials,
            SqliteStore::in_memory().await.unwrap(),
            Duration::from_secs(15),
            2,
        );
        let mut rx = engine.subscribe();

        engine.run_cycle().await.unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(2))));
        assert_eq!(rx.try_recv().unwrap().id, "<2@x>");
        assert_eq!(rx.try_recv().unwrap().id, "<3@x>");
    }
}
