//! Turns a retrieved raw email into a chat [`Message`].

use mchat_mime::address::{parse_first, parse_list};
use mchat_mime::date::parse_date;
use mchat_mime::{Address, Headers};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::{Message, MessageStatus};
use crate::quote;

/// Header set by mchat on the messages it sends.
pub const MCHAT_ID_HEADER: &str = "X-MCHAT-ID";

/// Builds a chat message from raw RFC 5322 bytes.
///
/// Never fails: missing headers give empty fields, an undecodable body
/// gives empty content and an unparsable date gives `None`.
///
/// A message carrying `Delivered-To` was received, so the chat is keyed by
/// its sender; otherwise it is one of ours and keyed by the recipient.
#[must_use]
pub fn process(raw: &[u8]) -> Message {
    let (headers, body) = match mchat_mime::Message::parse(raw) {
        Ok(parsed) => (parsed.headers, parsed.body),
        Err(e) => {
            debug!(error = %e, "Unparsable message");
            (Headers::new(), Vec::new())
        }
    };

    let sender = headers.get("from").and_then(parse_first);
    let recipient = first_recipient(&headers);
    let inbound = headers.contains("delivered-to");
    let counterpart = if inbound { &sender } else { &recipient };

    let content = match mchat_mime::plain_text(&headers, &body) {
        Ok(text) => quote::strip(&text),
        Err(e) => {
            debug!(error = %e, "Body could not be decoded");
            String::new()
        }
    };

    Message {
        id: message_id(&headers, raw),
        from: email_of(sender.as_ref()),
        to: email_of(recipient.as_ref()),
        contact: counterpart.as_ref().map(contact_name).unwrap_or_default(),
        chat_address: email_of(counterpart.as_ref()),
        content,
        date: headers.get("date").and_then(parse_date),
        status: MessageStatus::Delivered,
    }
}

/// First address of the first non-empty list among To, Cc and Bcc.
fn first_recipient(headers: &Headers) -> Option<Address> {
    ["to", "cc", "bcc"].iter().find_map(|name| {
        headers
            .get(name)
            .and_then(|value| parse_list(value).into_iter().next())
    })
}

fn message_id(headers: &Headers, raw: &[u8]) -> String {
    headers
        .get_non_empty(MCHAT_ID_HEADER)
        .or_else(|| headers.get_non_empty("message-id"))
        .map_or_else(|| content_digest(raw), str::to_string)
}

/// Stable id for messages without any id header.
fn content_digest(raw: &[u8]) -> String {
    let digest = Sha256::digest(raw);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

fn email_of(address: Option<&Address>) -> String {
    address.map(|a| a.email.clone()).unwrap_or_default()
}

fn contact_name(address: &Address) -> String {
    match address.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => address.email.clone(),
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
    use chrono::{TimeZone, Utc};

    const INBOUND: &[u8] = b"Delivered-To: me@gmail.com\r\n\
From: \"Alice Liddell\" <alice@example.com>\r\n\
To: me@gmail.com\r\n\
Date: Mon, 2 Jan 2006 15:04:05 -0700\r\n\
Message-ID: <abc@example.com>\r\n\
\r\n\
Hello!\r\n";

    #[test]
    fn test_inbound_keys_chat_by_sender() {
        let m = process(INBOUND);
        assert_eq!(m.id, "<abc@example.com>");
        assert_eq!(m.from, "alice@example.com");
        assert_eq!(m.to, "me@gmail.com");
        assert_eq!(m.chat_address, "alice@example.com");
        assert_eq!(m.contact, "Alice Liddell");
        assert_eq!(m.content, "Hello!\r\n");
        assert_eq!(
            m.date,
            Some(Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap())
        );
        assert_eq!(m.status, MessageStatus::Delivered);
    }

    #[test]
    fn test_outbound_keys_chat_by_recipient() {
        let raw = b"From: me@gmail.com\r\n\
To: Bob <bob@example.com>\r\n\
X-MCHAT-ID: <1700000000@mchat.mchat>\r\n\
Message-ID: <server-assigned@gmail.com>\r\n\
\r\n\
sent from mchat";
        let m = process(raw);
        assert_eq!(m.id, "<1700000000@mchat.mchat>");
        assert_eq!(m.chat_address, "bob@example.com");
        assert_eq!(m.contact, "Bob");
    }

    #[test]
    fn test_recipient_falls_back_to_cc_then_bcc() {
        let m = process(b"From: me@x.org\r\nTo: \r\nCc: \r\nBcc: hidden@x.org\r\n\r\nhi");
        assert_eq!(m.to, "hidden@x.org");
        assert_eq!(m.chat_address, "hidden@x.org");
        assert_eq!(m.contact, "hidden@x.org");
    }

    #[test]
    fn test_blank_delivered_to_is_outbound() {
        let m = process(b"Delivered-To:\r\nFrom: a@x.org\r\nTo: b@x.org\r\n\r\nhi");
        assert_eq!(m.chat_address, "b@x.org");
    }

    #[test]
    fn test_missing_headers_and_bad_date() {
        let m = process(b"Date: sometime last week\r\n\r\nbody\n");
        assert_eq!(m.from, "");
        assert_eq!(m.to, "");
        assert_eq!(m.chat_address, "");
        assert_eq!(m.contact, "");
        assert_eq!(m.date, None);
        assert_eq!(m.content, "body\n");
    }

    #[test]
    fn test_digest_id_is_stable() {
        let raw = b"From: a@x.org\r\n\r\nno ids here";
        let first = process(raw);
        assert!(first.id.starts_with("sha256:"));
        assert_eq!(first.id.len(), "sha256:".len() + 64);
        assert_eq!(process(raw).id, first.id);
        assert_ne!(process(b"From: a@x.org\r\n\r\nother").id, first.id);
    }

    #[test]
    fn test_undecodable_body_gives_empty_content() {
        let raw = b"From: a@x.org\r\nContent-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\r\n!!!not base64!!!";
        let m = process(raw);
        assert_eq!(m.content, "");
        assert_eq!(m.from, "a@x.org");
    }

    #[test]
    fn test_quoted_reply_is_stripped() {
        let raw = b"Delivered-To: me@x.org\r\nFrom: a@x.org\r\n\r\n\
Who's There?\n\nOn 2006-01-02 MChat wrote:\n\n> Knock Knock!\n";
        assert_eq!(process(raw).content, "Who's There?");
    }

    #[test]
    fn test_empty_input() {
        let m = process(b"");
        assert!(m.id.starts_with("sha256:"));
        assert_eq!(m.content, "");
    }
}
