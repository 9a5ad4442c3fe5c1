//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Readers collapse every variant into "no session"; the distinction only
/// reaches logs and the operator CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// Token does not have the `payload.mac` shape or a payload field is bad.
    #[error("malformed session token: {0}")]
    Malformed(String),

    /// MAC did not match the payload under the configured secret.
    #[error("session token signature mismatch")]
    BadSignature,

    /// Token verified but its expiry is not in the future.
    #[error("session token expired at {expires_at}")]
    Expired {
        /// Expiry carried by the token (epoch seconds).
        expires_at: i64,
    },

    /// No signing secret is configured.
    #[error("session secret is not configured")]
    MissingSecret,

    /// Refused to issue a session for an empty subject.
    #[error("session subject must not be empty")]
    InvalidSubject,

    /// Cookie attributes are inconsistent.
    #[error("invalid cookie options: {0}")]
    Cookie(String),

    /// Base64url decoding failed.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
