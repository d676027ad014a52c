//! # mchat-mime
//!
//! Lenient MIME parsing for turning email into chat text.
//!
//! ## Features
//!
//! - **Header parsing**: Case-insensitive, folded continuation lines, explicit presence checks
//! - **Plain-text extraction**: Depth-first walk of nested multipart bodies, first
//!   `text/plain` leaf wins
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Addresses and dates**: RFC 5322 address lists and RFC 2822 dates
//!
//! ## Quick Start
//!
//! ```ignore
//! use mchat_mime::Message;
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello!\r\n";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.plain_text()?, "Hello!\r\n");
//! ```
//!
//! Multipart bodies are walked in order and the first part that produces
//! non-empty plain text is returned; HTML alternatives are never rendered.
//!
//! ```ignore
//! use mchat_mime::{address, date};
//!
//! let from = address::parse_list("\"Alice A.\" <alice@example.com>, bob@example.com");
//! assert_eq!(from[0].email, "alice@example.com");
//!
//! let sent = date::parse_date("Mon, 2 Jan 2006 15:04:05 -0700");
//! assert!(sent.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod address;
pub mod date;
pub mod encoding;

pub use address::Address;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, plain_text};
