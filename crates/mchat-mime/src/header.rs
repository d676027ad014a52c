//! Email header handling.

use std::collections::HashMap;

/// Collection of email headers.
///
/// Names are compared case-insensitively. Values keep their arrival order
/// per name so that "first value wins" lookups are stable.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets the first value for a header, ignoring values that are blank.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header appears with a non-blank value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_non_empty(name).is_some()
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Lines starting with a space or
    /// tab continue the previous header. Lines without a colon are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value.trim());
            }

            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value.trim());
        }

        headers
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_parse_folded() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Content-Type: multipart/alternative;\r\n",
            "\tboundary=\"abc\"\r\n",
            "\r\n",
            "Not-A-Header: body text\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("multipart/alternative; boundary=\"abc\"")
        );
        assert!(headers.get("Not-A-Header").is_none());
    }

    #[test]
    fn test_headers_parse_bare_newlines() {
        let headers = Headers::parse("Subject: hi\nX-MCHAT-ID: <1@mchat.mchat>\n\nbody");
        assert_eq!(headers.get("x-mchat-id"), Some("<1@mchat.mchat>"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_headers_repeated_keep_order() {
        let headers = Headers::parse("Received: one\r\nReceived: two\r\n\r\n");
        assert_eq!(headers.get_all("received"), vec!["one", "two"]);
        assert_eq!(headers.get("received"), Some("one"));
    }

    #[test]
    fn test_contains_ignores_blank_values() {
        let headers = Headers::parse("Delivered-To:\r\nTo: bob@example.com\r\n\r\n");
        assert!(!headers.contains("Delivered-To"));
        assert!(headers.contains("to"));
        assert!(!headers.contains("cc"));
    }

    #[test]
    fn test_lines_without_colon_are_skipped() {
        let headers = Headers::parse("garbage line\r\nSubject: ok\r\n\r\n");
        assert_eq!(headers.get("subject"), Some("ok"));
        assert_eq!(headers.len(), 1);
    }
}
