//! Administrator handlers: user listing, role changes and account removal.

use serde::{Deserialize, Serialize};
use serde_json::json;

use aetherlog_core::{PublicUser, Role, UserId};
use aetherlog_store::{StoreError, UserEntity};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Role change request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    /// Target user ID (email).
    pub user_id: String,
    /// New role: `admin` or `user`.
    pub role: String,
}

/// Response to a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedUser {
    /// ID of the removed user.
    pub id: UserId,
}

/// List every user, without password hashes.
pub async fn list_users(state: &AppState, actor: &AuthUser) -> Result<Vec<PublicUser>, ApiError> {
    actor.require_admin()?;

    let users = UserEntity::list(&state.storage).await?;
    Ok(users.items.iter().map(PublicUser::from).collect())
}

/// Change a user's role.
///
/// An administrator cannot demote themselves while they are the only one.
pub async fn update_role(
    state: &AppState,
    actor: &AuthUser,
    request: UpdateRoleRequest,
) -> Result<PublicUser, ApiError> {
    actor.require_admin()?;

    let invalid = || ApiError::BadRequest("Invalid userId or role provided.".into());
    let user_id = UserId::new(&request.user_id).map_err(|_| invalid())?;
    let role: Role = request.role.parse().map_err(|_| invalid())?;

    if user_id == actor.user_id && role == Role::User {
        let users = UserEntity::list(&state.storage).await?;
        let admins = users.items.iter().filter(|u| u.is_admin()).count();
        if admins <= 1 {
            return Err(ApiError::BadRequest(
                "Cannot remove the last administrator.".into(),
            ));
        }
    }

    let entity = UserEntity::new(&state.storage, user_id);
    if !entity.exists().await? {
        return Err(user_not_found());
    }

    let updated = entity
        .patch(json!({ "role": role }))
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => user_not_found(),
            other => other.into(),
        })?;

    tracing::info!(
        actor = %actor.user_id,
        user_id = %updated.id,
        role = %role,
        "User role updated"
    );

    Ok(PublicUser::from(&updated))
}

/// Delete a user account. Administrators cannot delete themselves.
pub async fn delete_user(
    state: &AppState,
    actor: &AuthUser,
    user_id: &str,
) -> Result<DeletedUser, ApiError> {
    actor.require_admin()?;

    let user_id = UserId::new(user_id).map_err(|_| ApiError::BadRequest("Invalid userId.".into()))?;
    if user_id == actor.user_id {
        return Err(ApiError::BadRequest(
            "Administrators cannot delete their own account.".into(),
        ));
    }

    if !UserEntity::delete(&state.storage, &user_id).await? {
        return Err(ApiError::NotFound(
            "User not found or already deleted.".into(),
        ));
    }

    tracing::info!(actor = %actor.user_id, user_id = %user_id, "User deleted");

    Ok(DeletedUser { id: user_id })
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found.".into())
}
