//! chapel-auth
//!
//! Stateless session tokens for the Chapel administration site. A session is a
//! small JSON payload (`userId`, `role`, `exp`) signed with HMAC-SHA-256 under a
//! process-wide secret:
//!
//! - **Codec** ([`encode_token`], [`decode`], [`Token`]) builds and splits
//!   `base64url(payload) "." base64url(mac)` strings.
//! - **Signers** come in two flavours that must agree byte for byte:
//!   [`mac`] (RustCrypto, synchronous) for the application and [`edge`]
//!   (`ring`, async) for the request gate.
//! - **Issuer / Reader** ([`SessionIssuer`], [`SessionReader`]) create sessions
//!   after login and recover them from the `Cookie` header.
//!
//! ## Quick start
//! ```
//! use chapel_api::Role;
//! use chapel_auth::{CookieOptions, SessionIssuer, SessionReader, SessionSecret};
//!
//! # fn demo() -> chapel_auth::Result<()> {
//! let secret = SessionSecret::new("change-me")?;
//! let issued = SessionIssuer::new(secret.clone()).issue("member-1", Role::Member)?;
//! let set_cookie = issued.set_cookie(&CookieOptions::session("chapel", true))?;
//!
//! let reader = SessionReader::new(Some(secret), "chapel_session");
//! let cookie = format!("chapel_session={}", issued.token);
//! assert_eq!(reader.read(Some(&cookie)).map(|p| p.role), Some(Role::Member));
//! # let _ = set_cookie;
//! # Ok(()) }
//! # demo().unwrap();
//! ```

#![forbid(unsafe_code)]

mod codec;
mod cookie;
#[cfg(feature = "edge")]
pub mod edge;
mod error;
pub mod mac;
mod secret;
mod session;

pub use codec::{SessionPayload, Token, decode, encode_payload, encode_token};
pub use cookie::{
    CookieOptions, SameSite, build_clear_cookie, build_set_cookie, cookie_value,
    session_cookie_name,
};
pub use error::{Error, Result};
pub use secret::SessionSecret;
pub use session::{
    DEFAULT_SESSION_TTL_SECONDS, IssuedSession, SessionIssuer, SessionReader, now_epoch_secs,
};
