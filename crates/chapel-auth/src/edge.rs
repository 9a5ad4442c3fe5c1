//! Edge-runtime signer and verifier built on `ring`.
//!
//! The gate middleware runs this path. It never shares state with the
//! full-runtime signer in [`crate::mac`]; the two agree because both compute
//! HMAC-SHA-256 over the same encoded payload and emit the same base64url
//! alphabet. The API is async to match host crypto that only offers async
//! entry points.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::hmac;

use crate::codec::{SessionPayload, Token};
use crate::cookie::cookie_value;
use crate::{Error, Result, SessionSecret};

fn key(secret: &SessionSecret) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes())
}

/// MAC over the UTF-8 bytes of `encoded_payload`, base64url without padding.
#[allow(clippy::unused_async)]
pub async fn sign(secret: &SessionSecret, encoded_payload: &str) -> Result<String> {
    let tag = hmac::sign(&key(secret), encoded_payload.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(tag.as_ref()))
}

/// `ring::hmac::verify` compares in constant time and rejects length mismatches.
#[allow(clippy::unused_async)]
pub async fn verify(secret: &SessionSecret, encoded_payload: &str, presented_mac: &str) -> bool {
    let Ok(presented) = URL_SAFE_NO_PAD.decode(presented_mac) else {
        return false;
    };
    hmac::verify(&key(secret), encoded_payload.as_bytes(), &presented).is_ok()
}

/// Verify signature, then payload shape, then expiry.
pub async fn verify_token(secret: &SessionSecret, token: &str, now: i64) -> Result<SessionPayload> {
    let parsed = Token::parse(token)?;
    if !verify(secret, parsed.payload_part(), parsed.mac_part()).await {
        return Err(Error::BadSignature);
    }
    let payload = parsed.payload()?;
    if payload.is_expired_at(now) {
        return Err(Error::Expired {
            expires_at: payload.expires_at,
        });
    }
    Ok(payload)
}

/// Edge counterpart of [`crate::SessionReader::read_at`].
pub async fn read_session(
    secret: Option<&SessionSecret>,
    cookie_header: Option<&str>,
    cookie_name: &str,
    now: i64,
) -> Option<SessionPayload> {
    let token = cookie_value(cookie_header?, cookie_name)?;
    let Some(secret) = secret else {
        tracing::warn!("session cookie present but no session secret is configured");
        return None;
    };
    match verify_token(secret, token, now).await {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!(error = %e, "edge session rejected");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_payload, encode_token};
    use crate::mac;
    use crate::vectors::{
        RFC4231_DATA, RFC4231_HEX, RFC4231_KEY, TOKEN, TOKEN_SECRET, token_payload,
    };
    use chapel_api::Role;

    #[tokio::test]
    async fn matches_rfc4231_case_2() {
        let secret = SessionSecret::new(RFC4231_KEY).unwrap();
        let mac = sign(&secret, RFC4231_DATA).await.unwrap();
        assert_eq!(hex::encode(URL_SAFE_NO_PAD.decode(&mac).unwrap()), RFC4231_HEX);
    }

    #[tokio::test]
    async fn agrees_with_full_runtime_signer() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        for role in Role::ALL {
            let payload = SessionPayload {
                role,
                ..token_payload()
            };
            let encoded = encode_payload(&payload).unwrap();
            let full = mac::sign(&secret, &encoded).unwrap();
            let edge = sign(&secret, &encoded).await.unwrap();
            assert_eq!(full, edge);
            assert!(verify(&secret, &encoded, &full).await);
            assert!(mac::verify(&secret, &encoded, &edge));
        }
    }

    #[tokio::test]
    async fn both_runtimes_reproduce_pinned_token() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        assert_eq!(encode_token(&secret, &token_payload()).unwrap(), TOKEN);
        let (encoded, _) = TOKEN.split_once('.').unwrap();
        let edge_token = format!("{encoded}.{}", sign(&secret, encoded).await.unwrap());
        assert_eq!(edge_token, TOKEN);
    }

    #[tokio::test]
    async fn accepts_full_runtime_tokens() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        let token = encode_token(&secret, &token_payload()).unwrap();
        let payload = verify_token(&secret, &token, 0).await.unwrap();
        assert_eq!(payload, token_payload());
    }

    #[tokio::test]
    async fn rejects_other_secret_and_expired() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        let other = SessionSecret::new("secret-b").unwrap();
        let p = token_payload();
        let token = encode_token(&secret, &p).unwrap();
        assert!(matches!(
            verify_token(&other, &token, 0).await,
            Err(Error::BadSignature)
        ));
        assert!(matches!(
            verify_token(&secret, &token, p.expires_at).await,
            Err(Error::Expired { .. })
        ));
        assert!(verify_token(&secret, &token, p.expires_at - 1).await.is_ok());
    }

    #[tokio::test]
    async fn any_single_character_change_invalidates() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        assert!(verify_token(&secret, TOKEN, 0).await.is_ok());
        for (i, c) in TOKEN.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = TOKEN.to_string();
            tampered.replace_range(i..=i, &replacement.to_string());
            assert!(
                verify_token(&secret, &tampered, 0).await.is_err(),
                "flip at {i} accepted"
            );
        }
    }

    #[tokio::test]
    async fn garbage_mac_is_rejected() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        assert!(!verify(&secret, "payload", "***").await);
        assert!(!verify(&secret, "payload", "").await);
    }

    #[tokio::test]
    async fn missing_secret_reads_as_no_session() {
        let secret = SessionSecret::new(TOKEN_SECRET).unwrap();
        let token = encode_token(&secret, &token_payload()).unwrap();
        let header = format!("chapel_session={token}");
        assert!(read_session(None, Some(&header), "chapel_session", 0).await.is_none());
        assert!(
            read_session(Some(&secret), Some(&header), "chapel_session", 0)
                .await
                .is_some()
        );
        assert!(read_session(Some(&secret), None, "chapel_session", 0).await.is_none());
    }
}
