//! Terminal output.

use std::fmt::Write as _;

use mchat_core::{Chat, Message, MessageStatus};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One message per line: date, direction, counterpart, text.
pub fn message_line(message: &Message) -> String {
    let date = message
        .date
        .map_or_else(|| "----------------".to_string(), |d| d.format(DATE_FORMAT).to_string());
    let direction = if message.from == message.chat_address { '<' } else { '>' };
    let marker = match message.status {
        MessageStatus::Failed => " [failed]",
        MessageStatus::Pending => " [pending]",
        MessageStatus::Delivered => "",
    };
    format!(
        "{date} {direction} {}: {}{marker}",
        message.contact,
        one_line(&message.content)
    )
}

/// A conversation header followed by its messages.
pub fn chat(chat: &Chat) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} <{}> ({})", chat.name, chat.address, chat.messages.len());
    for message in &chat.messages {
        let _ = writeln!(out, "  {}", message_line(message));
    }
    out
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
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
    use chrono::{TimeZone, Utc};

    fn message(from: &str, status: MessageStatus) -> Message {
        Message {
            id: "<1@x>".into(),
            from: from.into(),
            to: "me@example.com".into(),
            contact: "Alice".into(),
            chat_address: "alice@example.com".into(),
            content: "Knock\r\nKnock!\r\n".into(),
            date: Some(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()),
            status,
        }
    }

    #[test]
    fn test_inbound_line() {
        let line = message_line(&message("alice@example.com", MessageStatus::Delivered));
        assert_eq!(line, "2006-01-02 15:04 < Alice: Knock Knock!");
    }

    #[test]
    fn test_failed_outbound_line() {
        let line = message_line(&message("me@example.com", MessageStatus::Failed));
        assert_eq!(line, "2006-01-02 15:04 > Alice: Knock Knock! [failed]");
    }

    #[test]
    fn test_chat_block() {
        let mut chat = Chat::new("alice@example.com");
        chat.name = "Alice".into();
        chat.messages.push(message("alice@example.com", MessageStatus::Delivered));
        assert_eq!(
            super::chat(&chat),
            "== Alice <alice@example.com> (1)\n  2006-01-02 15:04 < Alice: Knock Knock!\n"
        );
    }
}
