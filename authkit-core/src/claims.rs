//! Identity token codec.
//!
//! Decodes the middle segment of a dot-delimited identity token into claims.
//! This is a parser, not a verifier: no signature verification is performed,
//! the trust anchor is the transport to the issuing endpoint. Security review
//! item if tokens ever arrive from any other path.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims decoded from an identity token.
///
/// Unknown fields are ignored so issuer-side additions never break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier; doubles as the session's `user_id`.
    pub sub: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// E-mail address, when the issuer includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Decodes the claims segment of `id_token`.
///
/// The token must have at least three dot-separated segments with a non-empty
/// middle segment. The segment is converted from URL-safe base64 to standard
/// base64, padded, decoded, stripped of embedded NUL bytes, and parsed as a
/// JSON claims record.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the token shape or base64 is
/// invalid, and [`AuthError::InvalidClaims`] when the decoded payload is not
/// a valid claims record.
pub fn decode_claims(id_token: &str) -> Result<Claims, AuthError> {
    let segments: Vec<&str> = id_token.split('.').collect();
    if segments.len() < 3 || segments[1].is_empty() {
        return Err(AuthError::MalformedToken);
    }

    let mut segment: String = segments[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let remainder = segment.len() % 4;
    if remainder != 0 {
        segment.extend(std::iter::repeat('=').take(4 - remainder));
    }

    let decoded = STANDARD
        .decode(segment.as_bytes())
        .map_err(|_| AuthError::MalformedToken)?;

    // Embedded NULs have been observed in malformed issuer payloads; strip
    // them before parsing rather than rejecting the whole token.
    let sanitized: Vec<u8> = decoded.into_iter().filter(|b| *b != 0).collect();

    serde_json::from_slice(&sanitized)
        .map_err(|err| AuthError::InvalidClaims(err.to_string()))
}
