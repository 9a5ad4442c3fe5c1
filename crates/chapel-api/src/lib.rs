use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type SubjectId = String;

/// Roles a session can carry, from least to most privileged by [`Role::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
    TopAdmin,
    Finance,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Member, Role::Finance, Role::Admin, Role::TopAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::TopAdmin => "top_admin",
            Role::Finance => "finance",
        }
    }

    /// Privilege rank. Two roles with different ranks never share a rank.
    pub fn rank(self) -> u8 {
        match self {
            Role::Member => 0,
            Role::Finance => 1,
            Role::Admin => 2,
            Role::TopAdmin => 3,
        }
    }

    pub fn is_more_privileged_than(self, other: Role) -> bool {
        self.rank() > other.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChapelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "top_admin" => Ok(Role::TopAdmin),
            "finance" => Ok(Role::Finance),
            other => Err(ChapelError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// A verified identity handed to pages and API handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "userId")]
    pub subject_id: SubjectId,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum ChapelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("conflict error: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub trait SecretStore: Send + Sync {
    fn get(&self, secret_ref: &str) -> Result<String, ChapelError>;
}

/// Password checking lives outside the session layer; implementors hand back
/// an identity only for credentials they have verified.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, email: &str, password: &str) -> Result<Option<Identity>, ChapelError>;
    fn register(&self, email: &str, password: &str) -> Result<Identity, ChapelError>;
}
