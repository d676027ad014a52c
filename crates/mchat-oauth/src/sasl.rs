//! SASL initial responses.
//!
//! - PLAIN (RFC 4616), used by SMTP submission with a password
//! - XOAUTH2 (Google/Microsoft), used by POP3 and SMTP with a bearer token

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Generates the PLAIN initial response (RFC 4616).
///
/// Format: `\0<username>\0<password>`, base64 encoded. The empty
/// authorization identity means "same as the authentication identity".
///
/// # Example
///
/// ```
/// use mchat_oauth::sasl::plain_response;
///
/// let response = plain_response("test", "pass");
/// assert_eq!(response, "AHRlc3QAcGFzcw==");
/// ```
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// Generates the XOAUTH2 initial response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`, base64 encoded.
///
/// # Example
///
/// ```
/// use mchat_oauth::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@example.com", "ya29.a0...");
/// // POP3: AUTH XOAUTH2, then send `response` on its own line
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

/// Error details a server sends as the XOAUTH2 continuation after a
/// rejected token.
///
/// Format (base64 decoded): `{"status":"401","schemes":"bearer","scope":"..."}`
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuthChallenge {
    /// HTTP-like status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: String,
    /// `OAuth2` scope required.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Decodes a base64 XOAUTH2 error challenge.
///
/// Returns `None` when the payload is not a JSON challenge, which is the
/// case for an ordinary empty `+` continuation.
#[must_use]
pub fn decode_challenge(payload: &str) -> Option<OAuthChallenge> {
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
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

    fn decode(response: &str) -> String {
        String::from_utf8(STANDARD.decode(response).unwrap()).unwrap()
    }

    #[test]
    fn test_xoauth2_format() {
        let response = xoauth2_response("test@test.com", "abc");
        assert_eq!(decode(&response), "user=test@test.com\x01auth=Bearer abc\x01\x01");
        assert!(!response.contains("test@test.com"));
    }

    #[test]
    fn test_plain_format() {
        assert_eq!(decode(&plain_response("test", "pass")), "\0test\0pass");
        assert_eq!(decode(&plain_response("user", "pass@word!")), "\0user\0pass@word!");
    }

    #[test]
    fn test_decode_challenge() {
        let json = r#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let challenge = decode_challenge(&STANDARD.encode(json)).unwrap();
        assert_eq!(challenge.status, "401");
        assert_eq!(challenge.schemes, "bearer");
        assert_eq!(challenge.scope.as_deref(), Some("https://mail.google.com/"));
    }

    #[test]
    fn test_decode_challenge_not_json() {
        assert!(decode_challenge("").is_none());
        assert!(decode_challenge("not base64!").is_none());
        assert!(decode_challenge(&STANDARD.encode("hello")).is_none());
    }
}
