//! In-memory member accounts: seeded from config, extended by registration.
//!
//! Stands in for the site's real account store, which owns password policy.
//! Registration is open to anonymous visitors, so the directory holds at most
//! [`DEFAULT_MAX_MEMBERS`] accounts unless built with
//! [`MemberDirectory::with_max_members`]. Once full, `register` answers
//! `Conflict`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chapel_api::{ChapelError, CredentialVerifier, Identity, Role};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::MemberConfig;

/// Salt length in bytes, stored hex-encoded.
pub const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
pub const HASH_ITERATIONS: u32 = 100_000;

pub const DEFAULT_MAX_MEMBERS: usize = 10_000;

#[derive(Debug, Clone)]
struct MemberRecord {
    subject_id: String,
    role: Role,
    salt: String,
    password_hash: String,
}

#[derive(Debug)]
pub struct MemberDirectory {
    members: RwLock<BTreeMap<String, MemberRecord>>,
    max_members: usize,
}

impl Default for MemberDirectory {
    fn default() -> Self {
        Self {
            members: RwLock::default(),
            max_members: DEFAULT_MAX_MEMBERS,
        }
    }
}

impl MemberDirectory {
    pub fn from_config(members: &[MemberConfig]) -> Self {
        let members = members
            .iter()
            .map(|m| {
                (
                    normalize_email(&m.email),
                    MemberRecord {
                        subject_id: m.subject_id.clone(),
                        role: m.role,
                        salt: m.salt.clone(),
                        password_hash: m.password_hash.to_ascii_lowercase(),
                    },
                )
            })
            .collect();
        Self {
            members: RwLock::new(members),
            ..Self::default()
        }
    }

    /// Cap on registered plus configured accounts.
    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.max_members = max_members;
        self
    }

    pub fn len(&self) -> usize {
        self.members.read().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn stored_hash(&self, email: &str) -> Option<(String, String)> {
        let guard = self.members.read().ok()?;
        guard
            .get(&normalize_email(email))
            .map(|m| (m.salt.clone(), m.password_hash.clone()))
    }
}

impl CredentialVerifier for MemberDirectory {
    fn verify(&self, email: &str, password: &str) -> Result<Option<Identity>, ChapelError> {
        let guard = self
            .members
            .read()
            .map_err(|_| ChapelError::Internal("member directory poisoned".to_string()))?;
        let identity = guard.get(&normalize_email(email)).and_then(|m| {
            let attempt = hash_password(password, &m.salt);
            constant_time_eq(m.password_hash.as_bytes(), attempt.as_bytes()).then(|| Identity {
                subject_id: m.subject_id.clone(),
                role: m.role,
            })
        });
        Ok(identity)
    }

    fn register(&self, email: &str, password: &str) -> Result<Identity, ChapelError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(ChapelError::Validation("a valid email is required".to_string()));
        }
        if password.is_empty() {
            return Err(ChapelError::Validation("password must not be empty".to_string()));
        }

        let mut guard = self
            .members
            .write()
            .map_err(|_| ChapelError::Internal("member directory poisoned".to_string()))?;
        if guard.contains_key(&email) {
            return Err(ChapelError::Conflict(format!("{email} is already registered")));
        }
        if guard.len() >= self.max_members {
            tracing::warn!(max = self.max_members, "member directory is full");
            return Err(ChapelError::Conflict("member directory is full".to_string()));
        }

        let subject_id = subject_id_for(&email);
        let salt = generate_salt();
        guard.insert(
            email,
            MemberRecord {
                subject_id: subject_id.clone(),
                role: Role::Member,
                password_hash: hash_password(password, &salt),
                salt,
            },
        );
        tracing::info!(subject = %subject_id, "registered member");
        Ok(Identity {
            subject_id,
            role: Role::Member,
        })
    }
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Salted, iterated SHA-256, hex-encoded.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

fn subject_id_for(email: &str) -> String {
    let digest = hex::encode(Sha256::digest(email.as_bytes()));
    format!("m_{}", &digest[..12])
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREASURER_SALT: &str = "00112233445566778899aabbccddeeff";

    fn directory() -> MemberDirectory {
        MemberDirectory::from_config(&[MemberConfig {
            email: "Treasurer@Example.org".to_string(),
            subject_id: "m_treasurer".to_string(),
            role: Role::Finance,
            salt: TREASURER_SALT.to_string(),
            password_hash: hash_password("tithe", TREASURER_SALT),
        }])
    }

    #[test]
    fn verifies_configured_member() {
        let dir = directory();
        let id = dir.verify("treasurer@example.org", "tithe").unwrap().unwrap();
        assert_eq!(id.subject_id, "m_treasurer");
        assert_eq!(id.role, Role::Finance);
        assert!(dir.verify("treasurer@example.org", "wrong").unwrap().is_none());
        assert!(dir.verify("nobody@example.org", "tithe").unwrap().is_none());
    }

    #[test]
    fn registration_creates_members() {
        let dir = directory();
        let id = dir.register(" New@Example.org ", "pw").unwrap();
        assert_eq!(id.role, Role::Member);
        assert!(id.subject_id.starts_with("m_"));
        assert_eq!(id.subject_id.len(), 14);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.verify("new@example.org", "pw").unwrap(), Some(id));
    }

    #[test]
    fn registration_rejects_duplicates_and_blanks() {
        let dir = directory();
        assert!(matches!(
            dir.register("treasurer@example.org", "x"),
            Err(ChapelError::Conflict(_))
        ));
        assert!(matches!(dir.register("", "x"), Err(ChapelError::Validation(_))));
        assert!(matches!(dir.register("a@b", ""), Err(ChapelError::Validation(_))));
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_password("tithe", TREASURER_SALT),
            "3e1acd959822e48a329e8b124c098ff0d270391e3cf11cef1992e17c42f3992f"
        );
    }

    #[test]
    fn same_password_gets_distinct_hashes() {
        let dir = directory();
        dir.register("a@example.org", "pw").unwrap();
        dir.register("b@example.org", "pw").unwrap();
        let (salt_a, hash_a) = dir.stored_hash("a@example.org").unwrap();
        let (salt_b, hash_b) = dir.stored_hash("b@example.org").unwrap();
        assert_eq!(salt_a.len(), SALT_BYTES * 2);
        assert_ne!(salt_a, salt_b);
        assert_ne!(hash_a, hash_b);
        assert!(dir.verify("a@example.org", "pw").unwrap().is_some());
        assert!(dir.verify("b@example.org", "pw").unwrap().is_some());
    }

    #[test]
    fn registration_stops_when_full() {
        let dir = directory().with_max_members(2);
        dir.register("a@example.org", "pw").unwrap();
        assert!(matches!(
            dir.register("b@example.org", "pw"),
            Err(ChapelError::Conflict(_))
        ));
        assert_eq!(dir.len(), 2);
        assert!(dir.verify("treasurer@example.org", "tithe").unwrap().is_some());
    }
}
