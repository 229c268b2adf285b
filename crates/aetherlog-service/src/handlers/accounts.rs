//! Account handlers: sign-up and credential lookup.
//!
//! Both are rate limited per client. Password hashing and token issuance
//! happen in the caller; these handlers only see the finished hash.

use serde::{Deserialize, Serialize};

use aetherlog_core::{PublicUser, Role, User, UserId};
use aetherlog_store::{StoreError, UserEntity};

use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::state::AppState;

/// Characters that count as "special" for the password policy.
const PASSWORD_SPECIALS: &[char] = &['!', '@', '#', '$', '%', '^', '&', '*'];

/// Minimum password length.
const PASSWORD_MIN_LENGTH: usize = 8;

/// Sign-up request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    /// Display name.
    pub name: String,
    /// Email address; normalized into the user ID.
    pub email: String,
    /// Hash of a password that already passed [`check_password_policy`].
    pub password_hash: String,
}

/// Check a plain-text password against the password policy.
///
/// A password needs at least eight characters, including an upper-case
/// letter, a lower-case letter, a digit and one of `!@#$%^&*`.
///
/// # Errors
///
/// Returns `ApiError::BadRequest` if the password is too weak.
pub fn check_password_policy(password: &str) -> Result<(), ApiError> {
    let strong = password.chars().count() >= PASSWORD_MIN_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(&c));

    if strong {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Password does not meet security requirements.".into(),
        ))
    }
}

/// Register a new user.
///
/// The first account to sign up with the configured bootstrap admin email,
/// while no users exist yet, becomes an administrator. Everyone else is a
/// regular user.
pub async fn sign_up(
    state: &AppState,
    client: &str,
    request: SignUpRequest,
) -> Result<PublicUser, ApiError> {
    state.check_rate_limit(client).await?;

    let (Some(name), Some(email), Some(password_hash)) = (
        non_blank(&request.name),
        non_blank(&request.email),
        non_blank(&request.password_hash),
    ) else {
        return Err(ApiError::BadRequest(
            "Name, email, and password are required.".into(),
        ));
    };

    let user_id = UserId::new(email)?;
    if UserEntity::new(&state.storage, user_id.clone()).exists().await? {
        return Err(duplicate_email());
    }

    let role = initial_role(state, &user_id).await?;
    let user = User::new(user_id, name, password_hash.to_string(), role);

    let user = UserEntity::create(&state.storage, user)
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists { .. } => duplicate_email(),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, role = %role, "User signed up");

    Ok(PublicUser::from(&user))
}

/// Fetch the stored user for `email` so the caller can verify a password.
///
/// Unknown emails and accounts without a password hash are reported the same
/// way, as `ApiError::NotFound("Invalid credentials.")`.
pub async fn lookup_credentials(
    state: &AppState,
    client: &str,
    email: &str,
) -> Result<User, ApiError> {
    state.check_rate_limit(client).await?;

    let email = non_blank(email)
        .ok_or_else(|| ApiError::BadRequest("Email and password are required.".into()))?;
    let user_id = UserId::new(email).map_err(|_| invalid_credentials())?;

    let entity = UserEntity::new(&state.storage, user_id);
    if !entity.exists().await? {
        return Err(invalid_credentials());
    }

    let user = entity.get_state().await?;
    if user.password_hash.is_none() {
        tracing::warn!(user_id = %user.id, "Stored user has no password hash");
        return Err(invalid_credentials());
    }

    Ok(user)
}

async fn initial_role(state: &AppState, user_id: &UserId) -> Result<Role, ApiError> {
    let Some(bootstrap) = &state.config.bootstrap_admin_email else {
        return Ok(Role::User);
    };
    if user_id.as_str() != bootstrap {
        return Ok(Role::User);
    }

    let existing = UserEntity::list(&state.storage).await?;
    Ok(if existing.items.is_empty() {
        Role::Admin
    } else {
        Role::User
    })
}

fn duplicate_email() -> ApiError {
    ApiError::BadRequest("A user with this email already exists.".into())
}

fn invalid_credentials() -> ApiError {
    ApiError::NotFound("Invalid credentials.".into())
}
