//! `OAuth2` provider configurations.

use crate::error::{Error, Result};
use url::Url;

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Scopes the mail protocols need.
    pub scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token URL is invalid or not HTTP(S).
    pub fn new(name: impl Into<String>, token_url: impl AsRef<str>) -> Result<Self> {
        let token_url = Url::parse(token_url.as_ref())?;
        if !matches!(token_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "token_url must be http(s): {token_url}"
            )));
        }

        Ok(Self {
            name: name.into(),
            token_url,
            scopes: Vec::new(),
        })
    }

    /// Sets the scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Google configuration (`https://mail.google.com/` covers POP3 and SMTP).
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new("Google", "https://oauth2.googleapis.com/token")?
            .with_scopes(vec!["https://mail.google.com/".to_string()]))
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

    #[test]
    fn test_google_provider() {
        let provider = Provider::google().unwrap();
        assert_eq!(provider.name, "Google");
        assert_eq!(provider.token_url.host_str(), Some("oauth2.googleapis.com"));
        assert_eq!(provider.scopes, vec!["https://mail.google.com/".to_string()]);
    }

    #[test]
    fn test_custom_provider() {
        let provider = Provider::new("Local", "http://127.0.0.1:8080/token").unwrap();
        assert!(provider.scopes.is_empty());
    }

    #[test]
    fn test_invalid_provider() {
        assert!(matches!(Provider::new("x", "not a url"), Err(Error::Url(_))));
        assert!(matches!(
            Provider::new("x", "ftp://example.com/token"),
            Err(Error::InvalidConfig(_))
        ));
    }
}
