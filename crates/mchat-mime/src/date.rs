//! `Date` header parsing.

use chrono::{DateTime, Utc};

/// Parses an RFC 2822 date into UTC.
///
/// Trailing comments such as `(UTC)` or `(PDT)` are ignored. Returns `None`
/// when the value cannot be parsed.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc2822(strip_comment(value)))
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Formats a date for a `Date` header.
#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn strip_comment(value: &str) -> &str {
    value
        .rfind('(')
        .filter(|_| value.ends_with(')'))
        .map_or(value, |open| value[..open].trim_end())
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
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc2822() {
        let date = parse_date("Mon, 2 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap());
    }

    #[test]
    fn test_parse_with_comment() {
        let date = parse_date("Tue, 3 Jan 2006 10:00:00 +0000 (UTC)").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2006, 1, 3, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_format_is_parseable() {
        let date = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(parse_date(&format_date(&date)), Some(date));
    }
}
