//! MIME message structure and plain-text extraction.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Maximum multipart nesting that is walked before a branch is abandoned.
const MAX_DEPTH: usize = 16;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    fn from_headers(headers: &Headers) -> Self {
        headers
            .get("content-transfer-encoding")
            .map_or(Self::SevenBit, Self::parse)
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// One body part of a multipart entity.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Part {
    /// Parses a part from its raw bytes (headers, blank line, body).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_head_body(raw);
        Self {
            headers: Headers::parse(&String::from_utf8_lossy(head)),
            body: body.to_vec(),
        }
    }

    /// Gets the content type, defaulting to `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is present but invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_headers(&self.headers)
    }
}

/// A parsed email: top-level headers and the undecoded body.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message body (raw, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Message {
    /// Parses a raw message.
    ///
    /// The header block ends at the first empty line (CRLF or LF). A
    /// message without an empty line is treated as headers only.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Parse("Empty message".to_string()));
        }

        let (head, body) = split_head_body(raw);
        Ok(Self {
            headers: Headers::parse(&String::from_utf8_lossy(head)),
            body: body.to_vec(),
        })
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get_non_empty("message-id")
    }

    /// Extracts the best plain-text rendering of the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the top-level content type is invalid or its
    /// body cannot be decoded.
    pub fn plain_text(&self) -> Result<String> {
        plain_text(&self.headers, &self.body)
    }
}

/// Extracts the first human-readable plain text from a MIME entity.
///
/// - Without a `Content-Type` header the body is returned verbatim.
/// - `text/plain` is base64-decoded when declared so, otherwise used as is.
/// - `multipart/*` parts are walked depth-first and the first non-empty
///   plain text wins. Failing parts are skipped.
/// - Anything else yields an empty string.
///
/// # Errors
///
/// Returns an error if the top-level content type cannot be parsed, a
/// top-level multipart has no boundary, or a top-level base64 body is
/// invalid.
pub fn plain_text(headers: &Headers, body: &[u8]) -> Result<String> {
    let Some(content_type) = headers.get("content-type") else {
        return Ok(String::from_utf8_lossy(body).into_owned());
    };

    let content_type = ContentType::parse(content_type)?;
    let encoding = TransferEncoding::from_headers(headers);
    decode_entity(&content_type, encoding, body, 0)
}

fn decode_entity(
    content_type: &ContentType,
    encoding: TransferEncoding,
    body: &[u8],
    depth: usize,
) -> Result<String> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }

    if content_type.is_text_plain() {
        let bytes = match encoding {
            TransferEncoding::Base64 => decode_base64(body)?,
            // Only nested parts are QP-decoded; a top-level body is used as is.
            TransferEncoding::QuotedPrintable if depth > 0 => decode_quoted_printable(body)?,
            _ => body.to_vec(),
        };
        return Ok(bytes_to_text(&bytes, content_type.charset()));
    }

    if content_type.is_multipart() {
        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        for part in split_multipart(body, boundary) {
            let Ok(part_type) = part.content_type() else {
                continue;
            };
            match decode_entity(&part_type, part.transfer_encoding(), &part.body, depth + 1) {
                Ok(text) if !text.is_empty() => return Ok(text),
                _ => {}
            }
        }
    }

    Ok(String::new())
}

fn bytes_to_text(bytes: &[u8], charset: Option<&str>) -> String {
    match charset.map(str::to_ascii_lowercase).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1") => bytes.iter().map(|&b| char::from(b)).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Splits a multipart body into its parts.
///
/// The preamble and epilogue are dropped. A missing close delimiter is
/// tolerated; the last part then runs to the end of the body.
#[must_use]
pub fn split_multipart(body: &[u8], boundary: &str) -> Vec<Part> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut offset = 0;

    while offset < body.len() {
        let line_end = body[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |p| offset + p + 1);
        let line = trim_line_ending(&body[offset..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let is_close = rest.starts_with(b"--");
            let trailing_ok = rest
                .strip_prefix(b"--")
                .unwrap_or(rest)
                .iter()
                .all(u8::is_ascii_whitespace);

            if trailing_ok {
                if let Some(start) = part_start.take() {
                    let content = strip_final_newline(&body[start..offset]);
                    parts.push(Part::parse(content));
                }
                if is_close {
                    return parts;
                }
                part_start = Some(line_end);
            }
        }

        offset = line_end;
    }

    if let Some(start) = part_start {
        parts.push(Part::parse(&body[start..]));
    }

    parts
}

/// Splits raw bytes at the first empty line into (headers, body).
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut offset = 0;
    while offset < raw.len() {
        let line_end = raw[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |p| offset + p + 1);
        if trim_line_ending(&raw[offset..line_end]).is_empty() {
            return (&raw[..offset], &raw[line_end..]);
        }
        offset = line_end;
    }
    (raw, &[])
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn strip_final_newline(content: &[u8]) -> &[u8] {
    content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content)
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
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_message_parse_splits_at_blank_line() {
        let message = Message::parse(b"From: a@x\r\nTo: b@y\r\n\r\nHello\r\n\r\nWorld\r\n").unwrap();
        assert_eq!(message.from(), Some("a@x"));
        assert_eq!(message.to(), Some("b@y"));
        assert_eq!(message.body, b"Hello\r\n\r\nWorld\r\n");
    }

    #[test]
    fn test_message_parse_headers_only() {
        let message = Message::parse(b"Subject: only headers\r\n").unwrap();
        assert_eq!(message.headers.get("subject"), Some("only headers"));
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_message_parse_empty_fails() {
        assert!(Message::parse(b"").is_err());
    }

    #[test]
    fn test_no_content_type_is_verbatim() {
        let message = Message::parse(b"From: a@x\n\nJust text =3D here\n").unwrap();
        assert_eq!(message.plain_text().unwrap(), "Just text =3D here\n");
    }

    #[test]
    fn test_text_plain_base64() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
SGVsbG8sIFdvcmxkIQ==\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.plain_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_top_level_quoted_printable_is_left_alone() {
        let raw = b"Content-Type: text/plain\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
a=3Db";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.plain_text().unwrap(), "a=3Db");
    }

    #[test]
    fn test_html_only_yields_empty() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>hi</p>";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "");
    }

    #[test]
    fn test_invalid_content_type_is_error() {
        let raw = b"Content-Type: nonsense\r\n\r\nbody";
        assert!(Message::parse(raw).unwrap().plain_text().is_err());
    }

    #[test]
    fn test_multipart_missing_boundary_is_error() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(
            Message::parse(raw).unwrap().plain_text(),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn test_multipart_alternative_prefers_first_plain() {
        let raw = b"Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
preamble\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain body\r\n\
--b1\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body</p>\r\n\
--b1--\r\n\
epilogue\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.plain_text().unwrap(), "plain body");
    }

    #[test]
    fn test_multipart_html_first_then_plain() {
        let raw = b"Content-Type: multipart/alternative; boundary=b\n\
\n\
--b\n\
Content-Type: text/html\n\
\n\
<b>x</b>\n\
--b\n\
Content-Type: text/plain\n\
\n\
the text\n\
--b--\n";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "the text");
    }

    #[test]
    fn test_nested_multipart_with_base64_leaf() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\r\n\
\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>ignored</p>\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
SMOpbGxvIQ==\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf\r\n\
\r\n\
%PDF\r\n\
--outer--\r\n";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "Héllo!");
    }

    #[test]
    fn test_broken_part_is_skipped() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
!!!not base64!!!\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
second\r\n\
--b--\r\n";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "second");
    }

    #[test]
    fn test_part_quoted_printable_decoded() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=C3=A9 =3D good\r\n\
--b--\r\n";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "café = good");
    }

    #[test]
    fn test_part_without_content_type_defaults_to_plain() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
\r\n\
bare part\r\n\
--b--\r\n";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "bare part");
    }

    #[test]
    fn test_missing_close_delimiter_tolerated() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
unterminated";
        assert_eq!(Message::parse(raw).unwrap().plain_text().unwrap(), "unterminated");
    }

    #[test]
    fn test_latin1_charset() {
        let mut raw = b"Content-Type: text/plain; charset=ISO-8859-1\r\n\r\ncaf".to_vec();
        raw.push(0xE9);
        assert_eq!(Message::parse(&raw).unwrap().plain_text().unwrap(), "café");
    }

    #[test]
    fn test_boundary_lookalike_lines_are_content() {
        let parts = split_multipart(b"--b\r\nA: 1\r\n\r\n--bx not a delimiter\r\n--b--\r\n", "b");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"--bx not a delimiter");
    }

    #[test]
    fn test_depth_limit() {
        let mut body = b"leaf".to_vec();
        for level in 0..20 {
            let boundary = format!("l{level}");
            let mut wrapped = format!(
                "--{boundary}\r\nContent-Type: {}\r\n\r\n",
                if level == 0 {
                    "text/plain".to_string()
                } else {
                    format!("multipart/mixed; boundary=l{}", level - 1)
                }
            )
            .into_bytes();
            wrapped.extend_from_slice(&body);
            wrapped.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
            body = wrapped;
        }
        let mut headers = Headers::new();
        headers.add("Content-Type", "multipart/mixed; boundary=l19");
        assert_eq!(plain_text(&headers, &body).unwrap(), "");
    }
}
