//! Submission credentials.

/// How the client authenticates after `EHLO`.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `AUTH PLAIN` with a password.
    Password {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// `AUTH XOAUTH2` with an `OAuth2` bearer token.
    Token {
        /// Account address.
        username: String,
        /// Access token.
        access_token: String,
    },
}

impl Credentials {
    /// Password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bearer token credentials.
    #[must_use]
    pub fn token(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::Token {
            username: username.into(),
            access_token: access_token.into(),
        }
    }

    /// Returns the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::Token { username, .. } => username,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Password { .. } => "Password",
            Self::Token { .. } => "Token",
        };
        f.debug_struct(kind)
            .field("username", &self.username())
            .field("secret", &"[REDACTED]")
            .finish()
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
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", Credentials::token("me@gmail.com", "ya29.secret"));
        assert!(debug.contains("me@gmail.com"));
        assert!(!debug.contains("ya29"));
    }
}
