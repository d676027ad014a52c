//! # mchat-core
//!
//! Core logic for mchat, a chat client that rides on plain email.
//!
//! This crate provides:
//! - **Ingestion** - [`SyncEngine`] polls a POP3 mailbox and publishes new
//!   messages on a broadcast channel
//! - **Processing** - raw mail to chat [`Message`], with quoted reply text
//!   removed
//! - **Chats** - grouping by counterpart address, ordered by date
//! - **Storage** - `SQLite` persistence keyed by message id
//! - **Sending** - plain-text submission over SMTP
//! - **Accounts** - JSON configuration and keyring-backed secrets

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod chats;
pub mod config;
pub mod credentials;
mod error;
pub mod model;
pub mod processor;
pub mod quote;
pub mod send;
pub mod store;
pub mod sync;

pub use chats::{Chats, assemble};
pub use config::{AuthMode, Config, Endpoint, OAuthSettings};
pub use credentials::{
    AccountCredentials, CredentialError, CredentialProvider, CredentialResult, KeyringStore,
    MemorySecrets, SecretStore,
};
pub use error::{Error, Result};
pub use model::{Chat, Message, MessageStatus};
pub use send::{SendService, SmtpSubmitter, Submitter};
pub use store::{MessageStore, SqliteStore};
pub use sync::{Connector, CycleReport, IngestState, LocalIds, MailDrop, Pop3Connector, SyncEngine};
