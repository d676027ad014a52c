//! # mchat-pop3
//!
//! Async POP3 client (RFC 1939) for tokio with rustls.
//!
//! ## Features
//!
//! - **Type-state client**: `Client<S, Connected>` / `Client<S, Authenticated>`
//!   only expose the commands valid in that state
//! - **Runtime session**: [`Session`] enforces the same order for callers that
//!   hold one value across calls, and tracks whether it is still usable
//! - **Authentication**: `USER`/`PASS` and `AUTH XOAUTH2`
//! - **Deadlines**: every connect, read and write runs under a timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use mchat_pop3::{Config, Credentials, Security, Session};
//!
//! let config = Config::builder("pop.gmail.com").security(Security::Implicit).build();
//! let mut session = Session::connect(&config).await?;
//! session
//!     .authenticate(&Credentials::token("me@gmail.com", access_token))
//!     .await?;
//!
//! for info in session.list().await? {
//!     let raw = session.retrieve(info.id).await?;
//!     println!("{} bytes", raw.len());
//! }
//!
//! session.quit().await?;
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
pub mod response;
mod session;
pub mod stream;
mod types;

pub use client::{Authenticated, Client, Connected};
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT, Security};
pub use error::{Error, Result};
pub use session::Session;
pub use stream::Pop3Stream;
pub use types::{Credentials, MessageInfo, RawMessage};
