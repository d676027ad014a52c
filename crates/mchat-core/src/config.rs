//! Account and runtime configuration.
//!
//! Stored as JSON at `<config dir>/mchat/config.json`. Secrets never go in
//! this file; see [`crate::credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

const APP_DIR: &str = "mchat";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "mchat.db";

/// How the account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Password against a local bridge or test server.
    #[default]
    Password,
    /// `OAuth2` bearer token (Gmail).
    OAuth,
}

/// A server address with an optional TLS override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Hostname.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Forces TLS on or off; `None` picks it from the auth mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
}

impl Endpoint {
    /// Creates an endpoint without a TLS override.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
        }
    }
}

/// `OAuth2` client registration used for token refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    /// Client id.
    pub client_id: String,
    /// Client secret, for providers that require one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// mchat configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account address.
    pub user: String,
    /// Authentication mode.
    pub auth: AuthMode,
    /// POP3 server; defaults by auth mode when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop3: Option<Endpoint>,
    /// SMTP server; defaults by auth mode when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<Endpoint>,
    /// Seconds between fetch cycles.
    pub poll_interval_secs: u64,
    /// Per-operation network timeout in seconds.
    pub timeout_secs: u64,
    /// Capacity of the new-message broadcast channel.
    pub channel_capacity: usize,
    /// `OAuth2` client registration.
    pub oauth: OAuthSettings,
    /// Database location; defaults to `<data dir>/mchat/mchat.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: String::new(),
            auth: AuthMode::default(),
            pop3: None,
            smtp: None,
            poll_interval_secs: 15,
            timeout_secs: 5,
            channel_capacity: 256,
            oauth: OAuthSettings::default(),
            database_path: None,
        }
    }
}

impl Config {
    /// Returns the default config file location.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the platform has no config directory.
    pub fn path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| Error::Config("no config directory on this platform".into()))
    }

    /// Loads the config from the default location.
    ///
    /// A missing file gives the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Loads the config from `path`; a missing file gives the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loaded config");
                Ok(serde_json::from_str(&contents)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Saves the config to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Saves the config to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Returns true once a user has been configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.user.trim().is_empty()
    }

    /// POP3 server to poll.
    #[must_use]
    pub fn pop3_endpoint(&self) -> Endpoint {
        self.pop3.clone().unwrap_or_else(|| match self.auth {
            AuthMode::OAuth => Endpoint::new("pop.gmail.com", 995),
            AuthMode::Password => Endpoint::new("localhost", 1110),
        })
    }

    /// SMTP server to submit to.
    #[must_use]
    pub fn smtp_endpoint(&self) -> Endpoint {
        self.smtp.clone().unwrap_or_else(|| match self.auth {
            AuthMode::OAuth => Endpoint::new("smtp.gmail.com", 587),
            AuthMode::Password => Endpoint::new("localhost", 1025),
        })
    }

    /// Poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Network timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Database location.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no path is configured and the platform has
    /// no data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(DATABASE_FILE))
            .ok_or_else(|| Error::Config("no data directory on this platform".into()))
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

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("mchat-config-test-{}-{name}", std::process::id()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_defaults_by_auth_mode() {
        let mut config = Config::default();
        assert_eq!(config.pop3_endpoint(), Endpoint::new("localhost", 1110));
        assert_eq!(config.smtp_endpoint(), Endpoint::new("localhost", 1025));

        config.auth = AuthMode::OAuth;
        assert_eq!(config.pop3_endpoint(), Endpoint::new("pop.gmail.com", 995));
        assert_eq!(config.smtp_endpoint(), Endpoint::new("smtp.gmail.com", 587));

        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let config = Config {
            auth: AuthMode::OAuth,
            pop3: Some(Endpoint {
                host: "mail.example.com".into(),
                port: 1995,
                tls: Some(false),
            }),
            ..Config::default()
        };
        assert_eq!(config.pop3_endpoint().host, "mail.example.com");
        assert_eq!(config.pop3_endpoint().tls, Some(false));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from(&temp_path("missing")).unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.is_configured());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let config = Config {
            user: "me@gmail.com".into(),
            auth: AuthMode::OAuth,
            oauth: OAuthSettings {
                client_id: "id.apps.googleusercontent.com".into(),
                client_secret: Some("shh".into()),
            },
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"user":"a@b.c","auth":"oauth"}"#).unwrap();
        assert_eq!(config.auth, AuthMode::OAuth);
        assert_eq!(config.poll_interval_secs, 15);
    }
}
