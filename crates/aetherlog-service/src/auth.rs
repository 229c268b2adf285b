//! Caller identity.
//!
//! Tokens are issued and verified outside this crate. Whatever verifies them
//! hands the resulting identity to the handlers as an [`AuthUser`].

use aetherlog_core::{Role, User, UserId};

use crate::error::ApiError;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The caller's user ID.
    pub user_id: UserId,
    /// The role carried by the caller's token.
    pub role: Role,
}

impl AuthUser {
    /// Create an identity.
    #[must_use]
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Build an identity from token claims.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the claims do not name a valid user
    /// or role.
    pub fn from_claims(user_id: &str, role: &str) -> Result<Self, ApiError> {
        let user_id = UserId::new(user_id).map_err(|_| ApiError::Unauthorized)?;
        let role = role.parse().map_err(|_| ApiError::Unauthorized)?;
        Ok(Self { user_id, role })
    }

    /// Check if the caller is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require administrator rights.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` for non-admin callers.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, "Admin access denied");
            Err(ApiError::Forbidden)
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            role: user.effective_role(),
        }
    }
}
