//! Groups messages into per-contact conversations.

use std::collections::HashMap;

use crate::model::{Chat, Message, MessageStatus};

/// Builds chats from a message list.
///
/// Chats appear in the order their first message arrived. Within a chat
/// messages are ascending by date; equal dates keep arrival order and
/// messages without a date sort first. A repeated id is ignored.
#[must_use]
pub fn assemble(messages: &[Message]) -> Vec<Chat> {
    let mut chats = Chats::new();
    for message in messages {
        chats.insert(message.clone());
    }
    chats.into_vec()
}

/// Incrementally maintained chat list.
#[derive(Debug, Clone, Default)]
pub struct Chats {
    chats: Vec<Chat>,
    index: HashMap<String, usize>,
}

impl Chats {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message to its chat, creating the chat if needed.
    ///
    /// Returns false if the chat already holds a message with this id.
    pub fn insert(&mut self, message: Message) -> bool {
        let slot = match self.index.get(&message.chat_address) {
            Some(&slot) => slot,
            None => {
                let slot = self.chats.len();
                self.index.insert(message.chat_address.clone(), slot);
                self.chats.push(Chat::new(message.chat_address.clone()));
                slot
            }
        };
        let chat = &mut self.chats[slot];

        if chat.messages.iter().any(|m| m.id == message.id) {
            return false;
        }

        // After every message with an earlier or equal date
        let at = chat.messages.partition_point(|m| m.date <= message.date);
        chat.messages.insert(at, message);
        refresh_name(chat);
        true
    }

    /// Sets the status of the message with `id`.
    ///
    /// Returns false if no chat holds it.
    pub fn update_status(&mut self, id: &str, status: MessageStatus) -> bool {
        for chat in &mut self.chats {
            if let Some(message) = chat.messages.iter_mut().find(|m| m.id == id) {
                message.status = status;
                return true;
            }
        }
        false
    }

    /// Returns the chat for `address`.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&Chat> {
        self.index.get(address).map(|&slot| &self.chats[slot])
    }

    /// Iterates chats in first-arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    /// Returns the number of chats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Returns true if there are no chats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Chat> {
        self.chats
    }
}

/// Newest non-empty contact, else the address.
fn refresh_name(chat: &mut Chat) {
    chat.name = chat
        .messages
        .iter()
        .rev()
        .map(|m| m.contact.trim())
        .find(|c| !c.is_empty())
        .unwrap_or(&chat.address)
        .to_string();
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
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    fn msg(id: &str, chat: &str, contact: &str, date: Option<DateTime<Utc>>) -> Message {
        Message {
            id: id.into(),
            from: chat.into(),
            to: "me@x.org".into(),
            contact: contact.into(),
            chat_address: chat.into(),
            content: format!("content of {id}"),
            date,
            status: MessageStatus::Delivered,
        }
    }

    fn ids(chat: &Chat) -> Vec<&str> {
        chat.messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_groups_in_arrival_order() {
        let chats = assemble(&[
            msg("1", "bob@x.org", "Bob", at(30)),
            msg("2", "amy@x.org", "Amy", at(10)),
            msg("3", "bob@x.org", "Bob", at(20)),
        ]);
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].address, "bob@x.org");
        assert_eq!(ids(&chats[0]), vec!["3", "1"]);
        assert_eq!(chats[1].address, "amy@x.org");
    }

    #[test]
    fn test_equal_dates_keep_arrival_order() {
        let chats = assemble(&[
            msg("a", "c@x.org", "", at(5)),
            msg("b", "c@x.org", "", at(5)),
            msg("early", "c@x.org", "", at(1)),
            msg("c", "c@x.org", "", at(5)),
        ]);
        assert_eq!(ids(&chats[0]), vec!["early", "a", "b", "c"]);
    }

    #[test]
    fn test_undated_sort_first() {
        let chats = assemble(&[
            msg("dated", "c@x.org", "", at(5)),
            msg("undated", "c@x.org", "", None),
        ]);
        assert_eq!(ids(&chats[0]), vec!["undated", "dated"]);
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let mut second = msg("1", "c@x.org", "", at(9));
        second.content = "replacement".into();
        let chats = assemble(&[msg("1", "c@x.org", "", at(1)), second]);
        assert_eq!(chats[0].messages.len(), 1);
        assert_eq!(chats[0].messages[0].content, "content of 1");
    }

    #[test]
    fn test_name_from_newest_contact() {
        let chats = assemble(&[
            msg("1", "c@x.org", "Old Name", at(1)),
            msg("2", "c@x.org", "New Name", at(2)),
            msg("3", "c@x.org", "", at(3)),
        ]);
        assert_eq!(chats[0].name, "New Name");

        let chats = assemble(&[msg("1", "c@x.org", " ", at(1))]);
        assert_eq!(chats[0].name, "c@x.org");
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let input = vec![
            msg("1", "b@x.org", "B", at(3)),
            msg("2", "a@x.org", "A", None),
            msg("3", "b@x.org", "B", at(3)),
            msg("4", "a@x.org", "A", at(1)),
        ];
        assert_eq!(assemble(&input), assemble(&input));
    }

    #[test]
    fn test_update_status_and_get() {
        let mut chats = Chats::new();
        assert!(chats.insert(msg("1", "c@x.org", "", at(1))));
        assert!(!chats.insert(msg("1", "c@x.org", "", at(1))));

        assert!(chats.update_status("1", MessageStatus::Failed));
        assert!(!chats.update_status("missing", MessageStatus::Failed));
        assert_eq!(
            chats.get("c@x.org").unwrap().messages[0].status,
            MessageStatus::Failed
        );
        assert!(chats.get("nobody@x.org").is_none());
        assert_eq!(chats.iter().count(), 1);
    }
}
