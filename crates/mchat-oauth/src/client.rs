//! Token endpoint client.

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

/// `OAuth2` client registered with a provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Returns a token that is good to use right now.
    ///
    /// An unexpired token is returned unchanged. An expired one is
    /// refreshed. Callers detect a refresh by comparing `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if a refresh is needed and fails.
    pub async fn active_token(&self, token: &Token) -> Result<Token> {
        if !token.is_expired() {
            return Ok(token.clone());
        }

        debug!(provider = %self.provider.name, "Access token expired, refreshing");
        self.refresh_token(token).await
    }

    /// Refreshes an access token using its refresh token.
    ///
    /// A refresh token missing from the response is carried over from the
    /// old token.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(secret) = &self.client_secret {
            params.insert("client_secret", secret);
        }

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            debug!(error = %error.error, "Token refresh rejected");
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        let mut new_token = Token::from_response(token_response);

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        debug!(expires_at = ?new_token.expires_at, "Token refreshed");
        Ok(new_token)
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

    fn client() -> OAuthClient {
        OAuthClient::new("id", Provider::google().unwrap())
    }

    #[test]
    fn test_oauth_client_with_secret() {
        let client = client().with_client_secret("secret");
        assert_eq!(client.client_id, "id");
        assert_eq!(client.client_secret.as_deref(), Some("secret"));
    }

    #[test]
    fn test_active_token_unexpired_is_unchanged() {
        let token = Token::new("live", "Bearer").with_expires_at(Utc::now() + Duration::hours(1));
        let active = tokio_test::block_on(client().active_token(&token)).unwrap();
        assert_eq!(active, token);
    }

    #[test]
    fn test_expired_without_refresh_token_fails() {
        let token = Token::new("dead", "Bearer").with_expires_at(Utc::now() - Duration::hours(1));
        let result = tokio_test::block_on(client().active_token(&token));
        assert!(matches!(result, Err(Error::NoRefreshToken)));
    }
}
