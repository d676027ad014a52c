//! POP3 commands (RFC 1939 subset plus `AUTH XOAUTH2`).

use std::fmt;

/// A POP3 command line.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `USER <name>`
    User(String),
    /// `PASS <password>`
    Pass(String),
    /// `AUTH XOAUTH2`
    AuthXoauth2,
    /// A bare SASL response line sent after a `+` continuation.
    SaslResponse(String),
    /// `LIST`
    List,
    /// `RETR <id>`
    Retr(u32),
    /// `QUIT`
    Quit,
}

impl Command {
    /// Serializes the command without its line terminator.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::User(name) => format!("USER {name}"),
            Self::Pass(password) => format!("PASS {password}"),
            Self::AuthXoauth2 => "AUTH XOAUTH2".to_string(),
            Self::SaslResponse(response) => response.clone(),
            Self::List => "LIST".to_string(),
            Self::Retr(id) => format!("RETR {id}"),
            Self::Quit => "QUIT".to_string(),
        }
        .into_bytes()
    }

    /// Returns the command keyword, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User(_) => "USER",
            Self::Pass(_) => "PASS",
            Self::AuthXoauth2 => "AUTH",
            Self::SaslResponse(_) => "SASL",
            Self::List => "LIST",
            Self::Retr(_) => "RETR",
            Self::Quit => "QUIT",
        }
    }
}

/// Secrets never reach logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "USER {name}"),
            Self::Pass(_) => f.write_str("PASS ****"),
            Self::SaslResponse(_) => f.write_str("****"),
            Self::Retr(id) => write!(f, "RETR {id}"),
            other => f.write_str(other.name()),
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
    fn test_serialize() {
        assert_eq!(Command::User("bob".into()).serialize(), b"USER bob");
        assert_eq!(Command::Pass("hunter2".into()).serialize(), b"PASS hunter2");
        assert_eq!(Command::AuthXoauth2.serialize(), b"AUTH XOAUTH2");
        assert_eq!(Command::Retr(7).serialize(), b"RETR 7");
        assert_eq!(Command::List.serialize(), b"LIST");
        assert_eq!(Command::Quit.serialize(), b"QUIT");
    }

    #[test]
    fn test_debug_masks_secrets() {
        assert_eq!(format!("{:?}", Command::Pass("hunter2".into())), "PASS ****");
        assert_eq!(format!("{:?}", Command::SaslResponse("dXNlcj0=".into())), "****");
        assert_eq!(format!("{:?}", Command::User("bob".into())), "USER bob");
        assert_eq!(format!("{:?}", Command::AuthXoauth2), "AUTH");
    }
}
