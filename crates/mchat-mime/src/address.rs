//! RFC 5322 address list parsing.
//!
//! Parsing is lenient: anything that does not look like a mailbox is
//! skipped instead of failing the whole header.

use crate::encoding::decode_rfc2047;
use std::fmt;

/// A mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Display name, RFC 2047 decoded, if one was given.
    pub name: Option<String>,
    /// Bare email address.
    pub email: String,
}

impl Address {
    /// Creates an address without a display name.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Creates an address with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Returns the display name, or the email when there is none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Parses a single mailbox.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        parse_mailbox(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{}\" <{}>", name.replace('"', "\\\""), self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// Parses a comma-separated address list.
///
/// Supports `Name <a@b>`, `"Quoted, Name" <a@b>`, bare `a@b`,
/// `a@b (Comment Name)` and group syntax (`team: a@b, c@d;`).
#[must_use]
pub fn parse_list(value: &str) -> Vec<Address> {
    split_list(value)
        .iter()
        .filter_map(|segment| parse_mailbox(segment))
        .collect()
}

/// Returns the first address of a list, if any.
#[must_use]
pub fn parse_first(value: &str) -> Option<Address> {
    parse_list(value).into_iter().next()
}

fn parse_mailbox(segment: &str) -> Option<Address> {
    let segment = strip_group_prefix(segment.trim()).trim();
    let segment = segment.strip_suffix(';').unwrap_or(segment).trim();
    if segment.is_empty() {
        return None;
    }

    if let Some(open) = find_unquoted(segment, '<') {
        let close = segment[open..].find('>').map(|c| open + c)?;
        let email = segment[open + 1..close].trim();
        if email.is_empty() {
            return None;
        }
        let name = clean_name(&segment[..open]);
        return Some(Address {
            name,
            email: email.to_string(),
        });
    }

    // Bare address, optionally followed by a comment holding the name.
    let (email, comment) = match segment.find('(') {
        Some(open) => (
            segment[..open].trim(),
            segment[open + 1..].strip_suffix(')').map(clean_name),
        ),
        None => (segment, None),
    };

    if !email.contains('@') || email.contains(char::is_whitespace) {
        return None;
    }

    Some(Address {
        name: comment.flatten(),
        email: email.to_string(),
    })
}

fn clean_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or_else(|| trimmed.to_string(), |n| n.replace("\\\"", "\""));
    let decoded = decode_rfc2047(unquoted.trim());
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// Drops a leading `group-name:` outside quotes and angle brackets.
fn strip_group_prefix(segment: &str) -> &str {
    let mut in_quotes = false;
    for (i, ch) in segment.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => return segment,
            ':' if !in_quotes => return &segment[i + 1..],
            _ => {}
        }
    }
    segment
}

fn find_unquoted(segment: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in segment.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Splits on commas that are outside quotes, angle brackets and comments.
fn split_list(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut comment = 0usize;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' if comment == 0 => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                angle += 1;
                current.push(ch);
            }
            '>' if !in_quotes => {
                angle = angle.saturating_sub(1);
                current.push(ch);
            }
            '(' if !in_quotes => {
                comment += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                comment = comment.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_quotes && angle == 0 && comment == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
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
    fn test_name_and_angle_address() {
        let list = parse_list("Alice Example <alice@example.com>");
        assert_eq!(list, vec![Address::with_name("Alice Example", "alice@example.com")]);
    }

    #[test]
    fn test_bare_address() {
        let list = parse_list("bob@example.com");
        assert_eq!(list, vec![Address::new("bob@example.com")]);
        assert_eq!(list[0].display_name(), "bob@example.com");
    }

    #[test]
    fn test_quoted_name_with_comma() {
        let list = parse_list("\"Doe, Jane\" <jane@example.com>, bob@example.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Doe, Jane"));
        assert_eq!(list[0].email, "jane@example.com");
        assert_eq!(list[1].email, "bob@example.com");
    }

    #[test]
    fn test_angle_only() {
        let list = parse_list("<noreply@example.com>");
        assert_eq!(list, vec![Address::new("noreply@example.com")]);
    }

    #[test]
    fn test_encoded_name() {
        let list = parse_list("=?UTF-8?Q?Ren=C3=A9e?= <renee@example.com>");
        assert_eq!(list[0].name.as_deref(), Some("Renée"));
    }

    #[test]
    fn test_comment_name() {
        let list = parse_list("carol@example.com (Carol C)");
        assert_eq!(list, vec![Address::with_name("Carol C", "carol@example.com")]);
    }

    #[test]
    fn test_group_syntax() {
        let list = parse_list("team: a@example.com, b@example.com;");
        let emails: Vec<_> = list.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(parse_list("").is_empty());
        assert!(parse_list("undisclosed-recipients:;").is_empty());
        assert_eq!(parse_list("not an address, ok@example.com").len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Address::with_name("Alice", "alice@example.com").to_string(),
            "\"Alice\" <alice@example.com>"
        );
        assert_eq!(Address::new("a@b").to_string(), "a@b");
    }

    #[test]
    fn test_parse_first() {
        assert_eq!(parse_first("a@x, b@y").unwrap().email, "a@x");
        assert!(parse_first("").is_none());
    }
}
