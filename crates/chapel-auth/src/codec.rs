//! Session token encoding.
//!
//! A token is `base64url(payload_json) "." base64url(mac)`, both parts without
//! padding. The MAC covers the encoded payload string exactly as it appears in
//! the token, so verification never re-serializes anything.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chapel_api::{Identity, Role};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, SessionSecret, mac};

const SEPARATOR: char = '.';
const MAX_TOKEN_LEN: usize = 4096;

/// Signed session contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPayload {
    #[serde(rename = "userId")]
    pub subject_id: String,
    pub role: Role,
    /// Epoch seconds after which the session is no longer accepted.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl SessionPayload {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.subject_id.clone(),
            role: self.role,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(rename = "userId")]
    subject_id: String,
    role: Role,
    exp: serde_json::Number,
}

impl TryFrom<RawPayload> for SessionPayload {
    type Error = Error;

    fn try_from(raw: RawPayload) -> Result<Self> {
        if raw.subject_id.is_empty() {
            return Err(Error::Malformed("empty userId".to_string()));
        }
        let expires_at = expiry_seconds(&raw.exp)
            .ok_or_else(|| Error::Malformed(format!("invalid exp: {}", raw.exp)))?;
        Ok(Self {
            subject_id: raw.subject_id,
            role: raw.role,
            expires_at,
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn expiry_seconds(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return None;
    }
    Some(f.floor() as i64)
}

/// A token split into its two parts. Borrowed from the input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    payload_part: &'a str,
    mac_part: &'a str,
}

impl<'a> Token<'a> {
    /// Split into exactly two non-empty parts.
    pub fn parse(token: &'a str) -> Result<Self> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(Error::Malformed("token too long".to_string()));
        }
        let mut parts = token.split(SEPARATOR);
        let (Some(payload_part), Some(mac_part), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Malformed("expected two parts".to_string()));
        };
        if payload_part.is_empty() || mac_part.is_empty() {
            return Err(Error::Malformed("empty token part".to_string()));
        }
        Ok(Self {
            payload_part,
            mac_part,
        })
    }

    /// The encoded payload, i.e. the exact bytes the MAC covers.
    pub fn payload_part(&self) -> &'a str {
        self.payload_part
    }

    pub fn mac_part(&self) -> &'a str {
        self.mac_part
    }

    /// Decode and validate the payload. Does not check the MAC.
    pub fn payload(&self) -> Result<SessionPayload> {
        let bytes = URL_SAFE_NO_PAD.decode(self.payload_part)?;
        let raw: RawPayload = serde_json::from_slice(&bytes)?;
        SessionPayload::try_from(raw)
    }
}

/// Canonical JSON, base64url without padding.
pub fn encode_payload(payload: &SessionPayload) -> Result<String> {
    let json = serde_json::to_vec(payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Encode and sign with the full-runtime signer.
pub fn encode_token(secret: &SessionSecret, payload: &SessionPayload) -> Result<String> {
    let encoded = encode_payload(payload)?;
    let mac = mac::sign(secret, &encoded)?;
    Ok(format!("{encoded}{SEPARATOR}{mac}"))
}

/// Parse a token and decode its payload without verifying it.
pub fn decode(token: &str) -> Result<SessionPayload> {
    Token::parse(token)?.payload()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SessionPayload {
        SessionPayload {
            subject_id: "member-42".to_string(),
            role: Role::Finance,
            expires_at: 1_700_000_000,
        }
    }

    fn encode_json(json: &str) -> String {
        format!("{}.sig", URL_SAFE_NO_PAD.encode(json))
    }

    #[test]
    fn canonical_json_shape() {
        let encoded = encode_payload(&payload()).unwrap();
        let json = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"userId":"member-42","role":"finance","exp":1700000000}"#
        );
        assert!(!encoded.contains('='));
    }

    #[test]
    fn round_trip_every_role() {
        let secret = SessionSecret::new("secret").unwrap();
        for role in Role::ALL {
            let p = SessionPayload { role, ..payload() };
            let token = encode_token(&secret, &p).unwrap();
            assert_eq!(decode(&token).unwrap(), p);
        }
    }

    #[test]
    fn rejects_wrong_part_count() {
        for token in ["", "abc", "a.b.c", ".sig", "payload.", "."] {
            assert!(
                matches!(Token::parse(token), Err(Error::Malformed(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(decode("not*base64.sig"), Err(Error::Base64(_))));
        let padded = format!("{}=.sig", URL_SAFE_NO_PAD.encode(r#"{"a":1}"#));
        assert!(decode(&padded).is_err());
    }

    #[test]
    fn rejects_bad_shapes() {
        let cases = [
            "not json",
            r#"{"role":"member","exp":1}"#,
            r#"{"userId":"","role":"member","exp":1}"#,
            r#"{"userId":"u","role":"root","exp":1}"#,
            r#"{"userId":"u","exp":1}"#,
            r#"{"userId":"u","role":"member","exp":"soon"}"#,
            r#"{"userId":"u","role":"member"}"#,
            r#"{"userId":"u","role":"member","exp":1e400}"#,
        ];
        for json in cases {
            assert!(decode(&encode_json(json)).is_err(), "{json} should fail");
        }
    }

    #[test]
    fn fractional_expiry_is_floored() {
        let p = decode(&encode_json(r#"{"userId":"u","role":"admin","exp":99.7}"#)).unwrap();
        assert_eq!(p.expires_at, 99);
    }

    #[test]
    fn oversized_token_is_rejected() {
        let long = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(Token::parse(&long), Err(Error::Malformed(_))));
    }
}
