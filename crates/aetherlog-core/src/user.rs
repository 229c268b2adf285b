//! User records and roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DomainError, UserId};

/// Authorization role of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can manage other users' roles and accounts.
    Admin,
    /// Regular account.
    #[default]
    User,
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(DomainError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A registered user.
///
/// The password hash is produced and verified outside this crate; it is
/// carried here only so it can be persisted alongside the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Normalized email address.
    pub id: UserId,

    /// Email address as stored (same normalization as `id`).
    #[serde(default)]
    pub email: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Opaque password hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    /// Role; absent means [`Role::User`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl User {
    /// Create a user record with the given role.
    #[must_use]
    pub fn new(id: UserId, name: &str, password_hash: String, role: Role) -> Self {
        Self {
            email: id.to_string(),
            id,
            name: name.trim().to_string(),
            password_hash: Some(password_hash),
            role: Some(role),
        }
    }

    /// The empty user returned for an id that has never been stored.
    #[must_use]
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            email: String::new(),
            name: String::new(),
            password_hash: None,
            role: None,
        }
    }

    /// The role this user acts with.
    #[must_use]
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or_default()
    }

    /// Check if the user is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.effective_role() == Role::Admin
    }
}

/// A user as exposed to callers, without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Normalized email address.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Effective role.
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.effective_role(),
        }
    }
}
