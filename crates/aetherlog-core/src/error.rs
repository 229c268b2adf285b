//! Error types for AetherLog domain validation.

/// Errors raised while building or validating domain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Unknown role name.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Unknown call direction.
    #[error("invalid call direction: {0}")]
    InvalidDirection(String),
}
