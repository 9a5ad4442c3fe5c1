//! Session issuing and reading for the full runtime.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chapel_api::Role;

use crate::codec::{SessionPayload, Token, encode_token};
use crate::cookie::{CookieOptions, build_set_cookie, cookie_value};
use crate::{Error, Result, SessionSecret, mac};

/// Seven days.
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 604_800;

/// Creates signed sessions for identities that were already authenticated.
#[derive(Debug, Clone)]
pub struct SessionIssuer {
    secret: SessionSecret,
    ttl_seconds: u64,
}

/// A freshly signed session, ready to be attached to a response.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub payload: SessionPayload,
    pub max_age_seconds: u64,
}

impl IssuedSession {
    /// `Set-Cookie` value whose Max-Age matches the session TTL.
    pub fn set_cookie(&self, opts: &CookieOptions) -> Result<String> {
        let opts = opts.clone().with_max_age(self.max_age_seconds);
        build_set_cookie(&self.token, &opts)
    }
}

impl SessionIssuer {
    pub fn new(secret: SessionSecret) -> Self {
        Self {
            secret,
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn issue(&self, subject_id: &str, role: Role) -> Result<IssuedSession> {
        self.issue_at(subject_id, role, now_epoch_secs())
    }

    pub fn issue_at(&self, subject_id: &str, role: Role, now: i64) -> Result<IssuedSession> {
        if subject_id.trim().is_empty() {
            return Err(Error::InvalidSubject);
        }
        let ttl = i64::try_from(self.ttl_seconds)
            .map_err(|_| Error::Malformed(format!("ttl out of range: {}", self.ttl_seconds)))?;
        let payload = SessionPayload {
            subject_id: subject_id.to_string(),
            role,
            expires_at: now.saturating_add(ttl),
        };
        let token = encode_token(&self.secret, &payload)?;
        tracing::debug!(subject = %payload.subject_id, role = %role, "issued session");
        Ok(IssuedSession {
            token,
            payload,
            max_age_seconds: self.ttl_seconds,
        })
    }
}

/// Reads and verifies the session cookie of incoming requests.
///
/// A reader without a secret accepts nothing.
#[derive(Debug, Clone)]
pub struct SessionReader {
    secret: Option<SessionSecret>,
    cookie_name: String,
}

impl SessionReader {
    pub fn new(secret: Option<SessionSecret>, cookie_name: impl Into<String>) -> Self {
        Self {
            secret,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn secret(&self) -> Option<&SessionSecret> {
        self.secret.as_ref()
    }

    pub fn read(&self, cookie_header: Option<&str>) -> Option<SessionPayload> {
        self.read_at(cookie_header, now_epoch_secs())
    }

    pub fn read_at(&self, cookie_header: Option<&str>, now: i64) -> Option<SessionPayload> {
        let token = cookie_value(cookie_header?, &self.cookie_name)?;
        match self.verify_token(token, now) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!(error = %e, "session rejected");
                None
            }
        }
    }

    /// Signature first; the payload and its expiry are only trusted afterwards.
    pub fn verify_token(&self, token: &str, now: i64) -> Result<SessionPayload> {
        let secret = self.secret.as_ref().ok_or(Error::MissingSecret)?;
        let parsed = Token::parse(token)?;
        if !mac::verify(secret, parsed.payload_part(), parsed.mac_part()) {
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
}

pub fn now_epoch_secs() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}
