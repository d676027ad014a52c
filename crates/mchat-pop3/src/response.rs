//! POP3 status-line and listing parsers.

use crate::framed::trim_line;
use crate::types::MessageInfo;

/// A single-line server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `+OK [text]`
    Ok(String),
    /// `-ERR [text]`
    Err(String),
    /// `+ [payload]` SASL continuation.
    Continue(String),
    /// Anything else.
    Unknown(String),
}

impl Response {
    /// Classifies a status line.
    ///
    /// `+OK` is matched as a prefix, so `+OK` followed directly by text
    /// still counts as affirmative.
    #[must_use]
    pub fn parse(line: &[u8]) -> Self {
        let text = String::from_utf8_lossy(trim_line(line)).into_owned();

        if let Some(rest) = text.strip_prefix("+OK") {
            Self::Ok(rest.trim_start().to_string())
        } else if let Some(rest) = text.strip_prefix("-ERR") {
            Self::Err(rest.trim_start().to_string())
        } else if let Some(rest) = text.strip_prefix('+') {
            Self::Continue(rest.trim_start().to_string())
        } else {
            Self::Unknown(text)
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns the reply text without its status indicator.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Ok(t) | Self::Err(t) | Self::Continue(t) | Self::Unknown(t) => t,
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok(t) => write!(f, "+OK {t}"),
            Self::Err(t) => write!(f, "-ERR {t}"),
            Self::Continue(t) => write!(f, "+ {t}"),
            Self::Unknown(t) => f.write_str(t),
        }
    }
}

/// Parses the message count from the text after `+OK` of a LIST reply.
///
/// `"2 messages (320 octets)"` gives `Some(2)`.
#[must_use]
pub fn parse_list_count(text: &str) -> Option<usize> {
    text.split_whitespace().next()?.parse().ok()
}

/// Parses one `<id> <size>` listing line.
#[must_use]
pub fn parse_list_entry(line: &[u8]) -> Option<MessageInfo> {
    let text = std::str::from_utf8(trim_line(line)).ok()?;
    let mut fields = text.split_whitespace();
    let id = fields.next()?.parse().ok()?;
    let size = fields.next()?.parse().ok()?;
    Some(MessageInfo { id, size })
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
    use proptest::prelude::*;

    #[test]
    fn test_parse_status_lines() {
        assert_eq!(Response::parse(b"+OK POP3 ready\r\n"), Response::Ok("POP3 ready".into()));
        assert_eq!(Response::parse(b"+OK\r\n"), Response::Ok(String::new()));
        assert_eq!(Response::parse(b"-ERR no such message\r\n"), Response::Err("no such message".into()));
        assert_eq!(Response::parse(b"+ \r\n"), Response::Continue(String::new()));
        assert_eq!(Response::parse(b"+eyJzdGF0dXMiOiI0MDEifQ==\n"), Response::Continue("eyJzdGF0dXMiOiI0MDEifQ==".into()));
        assert_eq!(Response::parse(b"* garbage\r\n"), Response::Unknown("* garbage".into()));
    }

    #[test]
    fn test_list_count() {
        assert_eq!(parse_list_count("2 messages (320 octets)"), Some(2));
        assert_eq!(parse_list_count("0"), Some(0));
        assert_eq!(parse_list_count("two messages"), None);
        assert_eq!(parse_list_count(""), None);
        assert_eq!(parse_list_count("-1"), None);
    }

    #[test]
    fn test_list_entry() {
        assert_eq!(parse_list_entry(b"1 120\r\n"), Some(MessageInfo { id: 1, size: 120 }));
        assert_eq!(parse_list_entry(b"2 200 extra\n"), Some(MessageInfo { id: 2, size: 200 }));
        assert_eq!(parse_list_entry(b"x 200\r\n"), None);
        assert_eq!(parse_list_entry(b"3\r\n"), None);
        assert_eq!(parse_list_entry(b".\r\n"), None);
    }

    proptest! {
        #[test]
        fn list_entry_accepts_any_numbers(id in any::<u32>(), size in any::<u64>()) {
            let line = format!("{id} {size}\r\n");
            prop_assert_eq!(parse_list_entry(line.as_bytes()), Some(MessageInfo { id, size }));
        }

        #[test]
        fn parse_never_panics(line in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = Response::parse(&line);
        }
    }
}
