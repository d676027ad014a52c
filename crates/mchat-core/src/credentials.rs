//! Account secrets and the credentials handed to each fetch cycle.
//!
//! Secrets live in the platform's native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager
//!
//! A password is stored as is. An `OAuth2` token is stored as JSON so its
//! refresh token and expiry survive restarts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use keyring::Entry;
use mchat_oauth::{OAuthClient, Provider, Token};
use mchat_pop3::Credentials;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::Result;
use crate::config::{AuthMode, Config};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mchat";

const PASSWORD_CREDENTIAL: &str = "password";
const OAUTH_TOKEN_CREDENTIAL: &str = "oauth_token";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Stored token could not be (de)serialized.
    #[error("Stored token is malformed: {0}")]
    Token(#[from] serde_json::Error),

    /// No secret is stored for the account.
    #[error("No {kind} stored for {user}; run `mchat login` first")]
    Missing {
        /// Secret kind.
        kind: &'static str,
        /// Account address.
        user: String,
    },

    /// The account is not set up for the requested operation.
    #[error("Account not configured: {0}")]
    NotConfigured(String),

    /// The in-memory store's lock was poisoned.
    #[error("Secret store lock poisoned")]
    Poisoned,
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

fn credential_key(user: &str, credential_type: &str) -> String {
    format!("{SERVICE_NAME}_{credential_type}_{user}")
}

/// Key-value storage for secrets.
pub trait SecretStore: Send + Sync {
    /// Reads a secret; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    /// Writes a secret, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn set(&self, key: &str, value: &str) -> CredentialResult<()>;

    /// Removes a secret. Removing an absent secret succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, key: &str) -> CredentialResult<()>;
}

/// The system keyring.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        let entry = Entry::new(SERVICE_NAME, key)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "No keyring entry");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        Entry::new(SERVICE_NAME, key)?.set_password(value)?;
        debug!(key, "Stored keyring entry");
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        match Entry::new(SERVICE_NAME, key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local secret storage, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    entries: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemorySecrets {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| CredentialError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        let mut entries = self.entries.lock().map_err(|_| CredentialError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        let mut entries = self.entries.lock().map_err(|_| CredentialError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Stores the account password.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn store_password(store: &impl SecretStore, user: &str, password: &str) -> CredentialResult<()> {
    store.set(&credential_key(user, PASSWORD_CREDENTIAL), password)
}

/// Reads the account password.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn load_password(store: &impl SecretStore, user: &str) -> CredentialResult<Option<String>> {
    store.get(&credential_key(user, PASSWORD_CREDENTIAL))
}

/// Stores an `OAuth2` token as JSON.
///
/// # Errors
///
/// Returns an error if serialization or the store fails.
pub fn store_token(store: &impl SecretStore, user: &str, token: &Token) -> CredentialResult<()> {
    let json = serde_json::to_string(token)?;
    store.set(&credential_key(user, OAUTH_TOKEN_CREDENTIAL), &json)
}

/// Reads the stored `OAuth2` token.
///
/// # Errors
///
/// Returns an error if the store fails or the stored value is not a token.
pub fn load_token(store: &impl SecretStore, user: &str) -> CredentialResult<Option<Token>> {
    store
        .get(&credential_key(user, OAUTH_TOKEN_CREDENTIAL))?
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(Into::into)
}

/// Removes every secret stored for `user`.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn delete_all(store: &impl SecretStore, user: &str) -> CredentialResult<()> {
    store.delete(&credential_key(user, PASSWORD_CREDENTIAL))?;
    store.delete(&credential_key(user, OAUTH_TOKEN_CREDENTIAL))
}

/// Supplies credentials for a session.
pub trait CredentialProvider: Send + Sync {
    /// Returns credentials usable right now, refreshing a token if needed.
    fn credentials(&self) -> impl Future<Output = Result<Credentials>> + Send;
}

/// Credentials for the configured account.
///
/// In token mode the current token is cached; a refreshed token is written
/// back to the secret store.
#[derive(Debug)]
pub struct AccountCredentials<S = KeyringStore> {
    user: String,
    auth: AuthMode,
    oauth: Option<OAuthClient>,
    secrets: S,
    cached: AsyncMutex<Option<Token>>,
}

impl<S: SecretStore> AccountCredentials<S> {
    /// Builds the provider for `config`.
    ///
    /// Token mode uses Google's token endpoint with the configured client.
    ///
    /// # Errors
    ///
    /// Returns an error if no user is configured, or token mode has no
    /// client id.
    pub fn from_config(config: &Config, secrets: S) -> Result<Self> {
        if !config.is_configured() {
            return Err(CredentialError::NotConfigured("no user set".into()).into());
        }

        let oauth = match config.auth {
            AuthMode::Password => None,
            AuthMode::OAuth => {
                if config.oauth.client_id.is_empty() {
                    return Err(CredentialError::NotConfigured("no OAuth client id".into()).into());
                }
                let mut client = OAuthClient::new(&config.oauth.client_id, Provider::google()?);
                if let Some(secret) = &config.oauth.client_secret {
                    client = client.with_client_secret(secret);
                }
                Some(client)
            }
        };

        Ok(Self {
            user: config.user.clone(),
            auth: config.auth,
            oauth,
            secrets,
            cached: AsyncMutex::new(None),
        })
    }

    /// Replaces the `OAuth2` client and switches to token mode.
    #[must_use]
    pub fn with_oauth_client(mut self, client: OAuthClient) -> Self {
        self.auth = AuthMode::OAuth;
        self.oauth = Some(client);
        self
    }

    /// Account address.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Secret store backing this provider.
    pub const fn secrets(&self) -> &S {
        &self.secrets
    }

    fn missing(&self, kind: &'static str) -> CredentialError {
        CredentialError::Missing {
            kind,
            user: self.user.clone(),
        }
    }

    async fn token_credentials(&self) -> Result<Credentials> {
        let client = self
            .oauth
            .as_ref()
            .ok_or_else(|| CredentialError::NotConfigured("no OAuth client".into()))?;

        let mut cached = self.cached.lock().await;
        let current = match cached.take() {
            Some(token) => token,
            None => load_token(&self.secrets, &self.user)?.ok_or_else(|| self.missing("token"))?,
        };

        let active = match client.active_token(&current).await {
            Ok(token) => token,
            Err(e) => {
                *cached = Some(current);
                return Err(e.into());
            }
        };

        if active.access_token != current.access_token {
            store_token(&self.secrets, &self.user, &active)?;
            info!(user = %self.user, "Refreshed access token");
        }

        let credentials = Credentials::token(&self.user, &active.access_token);
        *cached = Some(active);
        Ok(credentials)
    }
}

impl<S: SecretStore> CredentialProvider for AccountCredentials<S> {
    async fn credentials(&self) -> Result<Credentials> {
        match self.auth {
            AuthMode::Password => {
                let password =
                    load_password(&self.secrets, &self.user)?.ok_or_else(|| self.missing("password"))?;
                Ok(Credentials::password(&self.user, password))
            }
            AuthMode::OAuth => self.token_credentials().await,
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
    use chrono::{Duration, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(auth: AuthMode) -> Config {
        let mut config = Config {
            user: "me@example.com".into(),
            auth,
            ..Config::default()
        };
        config.oauth.client_id = "client-1".into();
        config
    }

    /// Answers one token request with `body`.
    async fn token_server(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8(request).unwrap()
        });

        (url, handle)
    }

    #[test]
    fn test_password_roundtrip() {
        let store = MemorySecrets::default();
        assert!(load_password(&store, "a@b.c").unwrap().is_none());
        store_password(&store, "a@b.c", "hunter2").unwrap();
        assert_eq!(load_password(&store, "a@b.c").unwrap().as_deref(), Some("hunter2"));

        delete_all(&store, "a@b.c").unwrap();
        assert!(load_password(&store, "a@b.c").unwrap().is_none());
    }

    #[test]
    fn test_token_roundtrip() {
        let store = MemorySecrets::default();
        let token = Token::from_refresh_token("r-1");
        store_token(&store, "a@b.c", &token).unwrap();
        assert_eq!(load_token(&store, "a@b.c").unwrap(), Some(token));
    }

    #[test]
    fn test_malformed_token_is_error() {
        let store = MemorySecrets::default();
        store.set("mchat_oauth_token_a@b.c", "not json").unwrap();
        assert!(matches!(load_token(&store, "a@b.c"), Err(CredentialError::Token(_))));
    }

    #[test]
    fn test_unconfigured_account_is_rejected() {
        let result = AccountCredentials::from_config(&Config::default(), MemorySecrets::default());
        assert!(matches!(result, Err(Error::Credential(CredentialError::NotConfigured(_)))));

        let mut oauth = config(AuthMode::OAuth);
        oauth.oauth.client_id.clear();
        let result = AccountCredentials::from_config(&oauth, MemorySecrets::default());
        assert!(matches!(result, Err(Error::Credential(CredentialError::NotConfigured(_)))));
    }

    #[tokio::test]
    async fn test_password_mode() {
        let store = MemorySecrets::default();
        store_password(&store, "me@example.com", "pw").unwrap();
        let provider = AccountCredentials::from_config(&config(AuthMode::Password), store).unwrap();

        let credentials = provider.credentials().await.unwrap();
        assert_eq!(credentials, Credentials::password("me@example.com", "pw"));
    }

    #[tokio::test]
    async fn test_missing_password() {
        let provider =
            AccountCredentials::from_config(&config(AuthMode::Password), MemorySecrets::default()).unwrap();
        let err = provider.credentials().await.unwrap_err();
        assert!(matches!(err, Error::Credential(CredentialError::Missing { kind: "password", .. })));
    }

    #[tokio::test]
    async fn test_valid_token_is_used_without_refresh() {
        let store = MemorySecrets::default();
        let token = Token::new("still-good", "Bearer").with_expires_at(Utc::now() + Duration::hours(1));
        store_token(&store, "me@example.com", &token).unwrap();
        let provider = AccountCredentials::from_config(&config(AuthMode::OAuth), store).unwrap();

        let credentials = provider.credentials().await.unwrap();
        assert_eq!(credentials, Credentials::token("me@example.com", "still-good"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let (url, server) =
            token_server(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#).await;
        let store = MemorySecrets::default();
        store_token(&store, "me@example.com", &Token::from_refresh_token("r-1")).unwrap();

        let client = OAuthClient::new("client-1", Provider::new("Local", &url).unwrap());
        let provider = AccountCredentials::from_config(&config(AuthMode::OAuth), store)
            .unwrap()
            .with_oauth_client(client);

        let credentials = provider.credentials().await.unwrap();
        assert_eq!(credentials, Credentials::token("me@example.com", "fresh"));
        assert!(server.await.unwrap().contains("refresh_token=r-1"));

        let stored = load_token(provider.secrets(), "me@example.com").unwrap().unwrap();
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(stored.refresh_token.as_deref(), Some("r-1"));

        // Cached and unexpired: no second request.
        let again = provider.credentials().await.unwrap();
        assert_eq!(again, Credentials::token("me@example.com", "fresh"));
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_roundtrip() {
        let store = KeyringStore;
        store_password(&store, "test@mchat.invalid", "secret").unwrap();
        assert_eq!(
            load_password(&store, "test@mchat.invalid").unwrap().as_deref(),
            Some("secret")
        );
        delete_all(&store, "test@mchat.invalid").unwrap();
    }
}
