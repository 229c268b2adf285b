//! Error types for AetherLog storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
///
/// Write contention is not represented here: a lost compare-and-swap is an
/// `Ok(false)` from the store, retried internally by the entity layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-swap loop kept losing races until its attempt budget ran out.
    #[error("storage unavailable: gave up on {key} after {attempts} attempts")]
    RetriesExhausted {
        /// The contended key.
        key: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type name.
        entity: &'static str,
        /// The missing entity ID.
        id: String,
    },

    /// Entity already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Entity type name.
        entity: &'static str,
        /// The conflicting entity ID.
        id: String,
    },

    /// A patch could not be applied to the stored entity.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

impl StoreError {
    /// Whether this error means the storage layer could not serve the request.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RetriesExhausted { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
