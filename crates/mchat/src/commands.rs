//! Subcommand implementations.

use anyhow::{Context, bail};
use mchat_core::credentials::{store_password, store_token};
use mchat_core::{
    AccountCredentials, AuthMode, Config, Connector, CredentialProvider, Endpoint, KeyringStore,
    LocalIds, Message, MessageStatus, MessageStore, Pop3Connector, SendService, SmtpSubmitter,
    SqliteStore, SyncEngine, assemble,
};
use mchat_oauth::Token;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::render;

type Engine = SyncEngine<Pop3Connector, AccountCredentials, SqliteStore>;

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().context("reading config")?;
    if !config.is_configured() {
        bail!("no account configured; run `mchat login` first");
    }
    Ok(config)
}

async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let store = SqliteStore::new(&path.to_string_lossy())
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(store)
}

async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let credentials = AccountCredentials::from_config(config, KeyringStore)?;
    let connector = Pop3Connector::from_endpoint(&config.pop3_endpoint(), config.timeout());
    let store = open_store(config).await?;
    Ok(SyncEngine::new(
        connector,
        credentials,
        store,
        config.poll_interval(),
        config.channel_capacity,
    ))
}

/// Subscribes a printer, then replays stored history through it.
///
/// The printer runs until the engine's channel closes.
async fn start_feed<C, P, M, F>(
    engine: &mut SyncEngine<C, P, M>,
    mut print: F,
) -> anyhow::Result<JoinHandle<()>>
where
    C: Connector,
    P: CredentialProvider,
    M: MessageStore,
    F: FnMut(&Message) + Send + 'static,
{
    let mut rx = engine.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => print(&message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Display fell behind; run `mchat chats` for the full history");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    engine.bootstrap().await?;
    Ok(printer)
}

/// Prints history, then polls until interrupted.
pub async fn sync() -> anyhow::Result<()> {
    let config = load_config()?;
    let mut engine = build_engine(&config).await?;
    let printer = start_feed(&mut engine, |message| {
        println!("{}", render::message_line(message));
    })
    .await?;

    info!(user = %config.user, interval = ?config.poll_interval(), "Polling");
    tokio::select! {
        () = engine.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted");
        }
    }

    printer.abort();
    Ok(())
}

/// Runs one cycle and prints what it brought in.
pub async fn fetch() -> anyhow::Result<()> {
    let config = load_config()?;
    let mut engine = build_engine(&config).await?;
    engine.bootstrap().await?;

    let mut rx = engine.subscribe();
    let report = engine.run_cycle().await?;

    loop {
        match rx.try_recv() {
            Ok(message) => println!("{}", render::message_line(&message)),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "Output truncated"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    eprintln!("{report}");
    Ok(())
}

/// Prints stored conversations.
pub async fn chats(json: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = open_store(&config).await?;
    let chats = assemble(&store.load_all().await?);

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
    } else {
        for chat in &chats {
            print!("{}", render::chat(chat));
        }
    }
    Ok(())
}

/// Sends one message.
pub async fn send(address: &str, text: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let credentials = AccountCredentials::from_config(&config, KeyringStore)?;
    let submitter = SmtpSubmitter::from_endpoint(&config.smtp_endpoint(), config.timeout());
    let store = open_store(&config).await?;

    // No engine runs here; the stored copy seeds the next one.
    let (tx, _rx) = mpsc::unbounded_channel();
    let service = SendService::new(submitter, credentials, store, LocalIds::new(tx), &config.user);

    let message = service.send(address, text).await;
    println!("{}", render::message_line(&message));
    if message.status == MessageStatus::Failed {
        bail!("message to {address} was not delivered");
    }
    Ok(())
}

/// Options for `mchat login`.
pub struct Login {
    /// Account address.
    pub user: String,
    /// Password for plain mode.
    pub password: Option<String>,
    /// Refresh token for token mode.
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// POP3 override.
    pub pop3: Option<Endpoint>,
    /// SMTP override.
    pub smtp: Option<Endpoint>,
}

/// Writes the config file and stores the secret in the keyring.
pub fn login(options: Login) -> anyhow::Result<()> {
    let mut config = Config::load().context("reading config")?;
    config.user = options.user.trim().to_string();
    if let Some(client_id) = options.client_id {
        config.oauth.client_id = client_id;
    }
    if options.client_secret.is_some() {
        config.oauth.client_secret = options.client_secret;
    }
    if options.pop3.is_some() {
        config.pop3 = options.pop3;
    }
    if options.smtp.is_some() {
        config.smtp = options.smtp;
    }

    match (options.password, options.refresh_token) {
        (Some(password), _) => {
            config.auth = AuthMode::Password;
            store_password(&KeyringStore, &config.user, &password)?;
        }
        (None, Some(refresh_token)) => {
            if config.oauth.client_id.is_empty() {
                bail!("token login needs --client-id");
            }
            config.auth = AuthMode::OAuth;
            store_token(&KeyringStore, &config.user, &Token::from_refresh_token(refresh_token))?;
        }
        (None, None) => bail!("pass --password or --refresh-token"),
    }

    config.save()?;
    info!(user = %config.user, auth = ?config.auth, "Account saved");
    Ok(())
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
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use mchat_core::MemorySecrets;

    use super::*;

    fn stored(id: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            from: "alice@example.com".into(),
            to: "me@example.com".into(),
            contact: "Alice".into(),
            chat_address: "alice@example.com".into(),
            content: content.into(),
            date: None,
            status: MessageStatus::Delivered,
        }
    }

    #[tokio::test]
    async fn test_feed_prints_stored_history_in_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.save(&stored("<1@x>", "first")).await.unwrap();
        store.save(&stored("<2@x>", "second")).await.unwrap();

        let config = Config {
            user: "me@example.com".into(),
            ..Config::default()
        };
        let credentials = AccountCredentials::from_config(&config, MemorySecrets::default()).unwrap();
        let connector = Pop3Connector::new("127.0.0.1", 1, Duration::from_secs(1));
        let mut engine = SyncEngine::new(connector, credentials, store, Duration::from_secs(60), 16);

        let printed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&printed);
        let printer = start_feed(&mut engine, move |message| {
            sink.lock().unwrap().push(message.content.clone());
        })
        .await
        .unwrap();

        drop(engine);
        printer.await.unwrap();
        assert_eq!(*printed.lock().unwrap(), vec!["first", "second"]);
    }
}
