//! Process-wide signing secret.

use std::fmt;

use crate::{Error, Result};

/// Symmetric key used by both signer implementations.
///
/// Construction is the only place a missing secret is detected, so holding a
/// `SessionSecret` means signing can proceed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    /// Wrap raw key bytes. Empty input is treated as absent.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::MissingSecret);
        }
        Ok(Self(bytes))
    }

    /// Read the secret from a possibly-unset value (e.g. an env lookup).
    pub fn from_optional(value: Option<String>) -> Result<Self> {
        match value {
            Some(v) if !v.trim().is_empty() => Self::new(v.into_bytes()),
            _ => Err(Error::MissingSecret),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionSecret(<{} bytes redacted>)", self.0.len())
    }
}
