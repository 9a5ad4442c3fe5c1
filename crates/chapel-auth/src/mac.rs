//! Full-runtime HMAC-SHA-256 signer and verifier.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result, SessionSecret};

type HmacSha256 = Hmac<Sha256>;

/// MAC over the UTF-8 bytes of `encoded_payload`, base64url without padding.
pub fn sign(secret: &SessionSecret, encoded_payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::MissingSecret)?;
    mac.update(encoded_payload.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Recompute the MAC and compare it against `presented_mac` in constant time.
pub fn verify(secret: &SessionSecret, encoded_payload: &str, presented_mac: &str) -> bool {
    match sign(secret, encoded_payload) {
        Ok(expected) => constant_time_eq(expected.as_bytes(), presented_mac.as_bytes()),
        Err(_) => false,
    }
}

/// Length mismatch returns early; equal lengths are compared without an early exit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
