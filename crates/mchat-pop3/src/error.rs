//! Error types for the POP3 library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during POP3 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connection could not be established or the greeting was negative.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// LIST failed or returned an unparsable listing.
    #[error("LIST failed: {0}")]
    List(String),

    /// RETR was rejected by the server.
    #[error("RETR failed: {0}")]
    Retrieve(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Returns true if the session can no longer accept commands.
    ///
    /// A rejected `RETR` is the only server-side failure that leaves the
    /// command stream in sync; everything else desynchronizes or closes it.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::Retrieve(_) | Self::InvalidState(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_session_fatality() {
        assert!(!Error::Retrieve("-ERR no such message".into()).is_session_fatal());
        assert!(!Error::InvalidState("not authenticated".into()).is_session_fatal());
        assert!(Error::List("bad count".into()).is_session_fatal());
        assert!(Error::Timeout(Duration::from_secs(5)).is_session_fatal());
        assert!(Error::Io(std::io::ErrorKind::BrokenPipe.into()).is_session_fatal());
    }
}
