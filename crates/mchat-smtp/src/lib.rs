//! # mchat-smtp
//!
//! Async SMTP submission client (RFC 5321) for tokio with rustls.
//!
//! ## Features
//!
//! - **Type-state client**: `EHLO`, `AUTH`, `MAIL`, `RCPT` and `DATA` can only
//!   be issued in protocol order
//! - **TLS**: implicit TLS (port 465) and `STARTTLS` (port 587)
//! - **Authentication**: PLAIN and XOAUTH2
//! - **Deadlines**: every connect, read and write runs under a timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use mchat_smtp::{Address, Config, Credentials, send_mail};
//!
//! let config = Config::new("smtp.gmail.com");
//! let from = Address::new("me@gmail.com")?;
//! let to = Address::new("friend@example.com")?;
//!
//! send_mail(
//!     &config,
//!     &Credentials::token("me@gmail.com", access_token),
//!     &from,
//!     &[to],
//!     b"Subject: hi\r\n\r\nhello\r\n",
//! )
//! .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod client;
pub mod command;
mod config;
mod error;
pub mod framed;
pub mod parser;
mod send;
pub mod stream;
pub mod types;

pub use client::{Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo};
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT, Security};
pub use error::{Error, Result};
pub use send::{send_mail, submit};
pub use stream::SmtpStream;
pub use types::{Address, AuthMechanism, Credentials, Extension, Reply, ReplyCode};
