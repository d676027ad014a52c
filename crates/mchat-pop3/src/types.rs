//! POP3 value types.

use std::fmt;

/// One entry of a `LIST` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageInfo {
    /// Message number, valid for the current session only.
    pub id: u32,
    /// Size in octets as reported by the server.
    pub size: u64,
}

/// A retrieved message exactly as transferred, after dot-unstuffing.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage(Vec<u8>);

impl RawMessage {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the message, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the message has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMessage").field("len", &self.0.len()).finish()
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Credentials accepted by `authenticate`.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `USER` / `PASS`.
    Password {
        /// Mailbox user.
        username: String,
        /// Plaintext password.
        password: String,
    },
    /// `AUTH XOAUTH2` bearer token.
    Token {
        /// Mailbox user (email address).
        username: String,
        /// `OAuth2` access token.
        access_token: String,
    },
}

impl Credentials {
    /// Creates password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer-token credentials.
    #[must_use]
    pub fn token(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::Token {
            username: username.into(),
            access_token: access_token.into(),
        }
    }

    /// Returns the user name.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::Token { username, .. } => username,
        }
    }

    /// Returns true for bearer-token credentials.
    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Token { username, .. } => f
                .debug_struct("Token")
                .field("username", username)
                .finish_non_exhaustive(),
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

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::password("bob", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("bob"));
        assert!(!debug.contains("hunter2"));

        let token = Credentials::token("bob@example.com", "ya29.secret");
        assert!(!format!("{token:?}").contains("ya29"));
        assert!(token.is_token());
        assert_eq!(token.username(), "bob@example.com");
    }

    #[test]
    fn test_raw_message_debug_is_short() {
        let raw = RawMessage::from(b"Subject: hi\r\n\r\nbody".to_vec());
        assert_eq!(format!("{raw:?}"), "RawMessage { len: 19 }");
        assert_eq!(raw.len(), 19);
    }
}
