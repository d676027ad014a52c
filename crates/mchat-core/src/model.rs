//! Chat domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Submission in progress.
    Pending,
    /// Ingested from the mailbox, or accepted by the SMTP server.
    #[default]
    Delivered,
    /// Submission failed.
    Failed,
}

impl MessageStatus {
    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Parses a storage name. Unknown values read as `Delivered`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "failed" => Self::Failed,
            _ => Self::Delivered,
        }
    }
}

/// One chat message, decoded from or sent as an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Deduplication key.
    pub id: String,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Display name of the counterpart.
    pub contact: String,
    /// Address of the chat this message belongs to.
    pub chat_address: String,
    /// Plain text with quoted replies removed.
    pub content: String,
    /// Sent time; `None` when missing or unparsable.
    pub date: Option<DateTime<Utc>>,
    /// Delivery state.
    pub status: MessageStatus,
}

/// A conversation with one counterpart address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chat {
    /// Counterpart address.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Messages, ascending by date.
    pub messages: Vec<Message>,
}

impl Chat {
    /// Creates an empty chat.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            messages: Vec::new(),
        }
    }

    /// Returns the newest message.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
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
    fn test_status_names() {
        for status in [MessageStatus::Pending, MessageStatus::Delivered, MessageStatus::Failed] {
            assert_eq!(MessageStatus::parse(status.as_str()), status);
        }
        assert_eq!(MessageStatus::parse("bogus"), MessageStatus::Delivered);
    }

    #[test]
    fn test_message_json() {
        let message = Message {
            id: "<1@x>".into(),
            from: "a@x".into(),
            to: "b@x".into(),
            contact: "B".into(),
            chat_address: "b@x".into(),
            content: "hi".into(),
            date: None,
            status: MessageStatus::Failed,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json["date"].is_null());
    }
}
