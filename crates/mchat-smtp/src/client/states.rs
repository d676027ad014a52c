//! Type-state markers.

/// Greeting read; `EHLO`, `STARTTLS` and `AUTH` are available.
#[derive(Debug)]
pub struct Connected;

/// Authentication succeeded.
#[derive(Debug)]
pub struct Authenticated;

/// `MAIL FROM` accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one `RCPT TO` accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// `DATA` accepted; the server is waiting for the message.
#[derive(Debug)]
pub struct Data;
