//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` at end of line) are removed.
///
/// # Errors
///
/// Returns an error if the input contains an invalid escape sequence.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        match data.get(i + 1..i + 3) {
            Some([b'\r', b'\n']) => i += 3,
            Some([b'\n', _]) => i += 2,
            None if data.get(i + 1) == Some(&b'\n') => i += 2,
            None if i + 1 == data.len() => i += 1,
            Some([hi, lo]) => {
                let hex = [*hi, *lo];
                let byte = std::str::from_utf8(&hex)
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid escape sequence at byte {i}: ={}",
                            String::from_utf8_lossy(&hex)
                        ))
                    })?;
                result.push(byte);
                i += 3;
            }
            _ => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

/// Decodes RFC 2047 encoded words inside a header value.
///
/// Format of a single word: `=?charset?encoding?encoded-text?=`. Plain text
/// around encoded words is kept; whitespace between two adjacent encoded
/// words is dropped. Words that fail to decode are left untouched.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let decoded = find_word_end(candidate)
            .and_then(|end| decode_word(&candidate[2..end]).map(|word| (word, end + 2)));

        if let Some((word, consumed)) = decoded {
            if !(last_was_word && before.trim().is_empty()) {
                output.push_str(before);
            }
            output.push_str(&word);
            last_was_word = true;
            rest = &candidate[consumed..];
        } else {
            output.push_str(before);
            output.push_str("=?");
            last_was_word = false;
            rest = &candidate[2..];
        }
    }

    output.push_str(rest);
    output
}

/// Returns the offset of the closing `?=` of an encoded word starting at `=?`.
fn find_word_end(candidate: &str) -> Option<usize> {
    // charset ? encoding ? text ?=
    let inner = &candidate[2..];
    let first = inner.find('?')?;
    let second = first + 1 + inner[first + 1..].find('?')?;
    let close = second + 1 + inner[second + 1..].find("?=")?;
    Some(close + 2)
}

fn decode_word(inner: &str) -> Option<String> {
    let mut fields = inner.splitn(3, '?');
    let _charset = fields.next()?;
    let encoding = fields.next()?;
    let encoded_text = fields.next()?;

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded_text.as_bytes()).ok()?,
        "Q" | "q" => {
            let with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(with_spaces.as_bytes()).ok()?
        }
        _ => return None,
    };

    Some(String::from_utf8_lossy(&bytes).into_owned())
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
    fn test_base64_round_trip() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_ignores_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\r\nIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_base64(b"not base64!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo").unwrap(), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"plain").unwrap(), b"plain");
    }

    #[test]
    fn test_quoted_printable_keeps_utf8_input() {
        let decoded = decode_quoted_printable("déjà =3D vu".as_bytes()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "déjà = vu");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"trailing=").unwrap(), b"trailing");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable(b"bad =ZZ escape").is_err());
        assert!(decode_quoted_printable(b"short =4").is_err());
    }

    #[test]
    fn test_rfc2047_plain_passthrough() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
    }

    #[test]
    fn test_rfc2047_base64_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_q_word_with_surrounding_text() {
        assert_eq!(decode_rfc2047("Re: =?UTF-8?Q?caf=C3=A9_time?= now"), "Re: café time now");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?Ren?= =?utf-8?Q?=C3=A9e?="), "Renée");
    }

    #[test]
    fn test_rfc2047_malformed_left_alone() {
        assert_eq!(decode_rfc2047("=?broken"), "=?broken");
        assert_eq!(decode_rfc2047("a =?utf-8?X?abc?= b"), "a =?utf-8?X?abc?= b");
    }
}
