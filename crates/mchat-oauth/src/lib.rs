//! # mchat-oauth
//!
//! `OAuth2` support for the mail protocols: SASL initial responses and
//! access-token refresh.
//!
//! Acquiring the first token (browser or device authorization) happens
//! outside this crate. Given a stored [`Token`] with a refresh token,
//! [`OAuthClient::active_token`] hands back a usable access token,
//! refreshing it against the provider when it is about to expire.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mchat_oauth::{OAuthClient, Provider, sasl};
//!
//! let client = OAuthClient::new("client_id", Provider::google()?)
//!     .with_client_secret("secret");
//!
//! let token = client.active_token(&stored).await?;
//! if token.access_token != stored.access_token {
//!     // persist `token`
//! }
//!
//! // POP3 / SMTP: AUTH XOAUTH2 <response>
//! let response = sasl::xoauth2_response("user@gmail.com", &token.access_token);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod provider;
pub mod sasl;
pub mod token;

pub use client::OAuthClient;
pub use error::{Error, Result};
pub use provider::Provider;
pub use token::Token;
