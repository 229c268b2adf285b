//! Versioned document storage for AetherLog.
//!
//! This crate provides the storage core every feature sits on:
//!
//! - [`DocumentStore`]: one versioned JSON document per string key, with
//!   compare-and-swap as the only mutation primitive used under contention
//! - [`IndexedEntity`]: typed create/read/patch/delete/list for domain records,
//!   keeping a per-type index document in step with the entity documents
//! - [`RateLimiter`]: a fixed-window request counter built on the same CAS
//!   primitive
//!
//! # Architecture
//!
//! There are no cross-key transactions. Writes to one key are totally ordered
//! by version; writes to different keys are not ordered relative to each
//! other. All coordination between concurrent callers goes through
//! [`DocumentStore::compare_and_swap`].
//!
//! Keys used by this crate:
//!
//! - `<entity>:<id>`: entity documents (for example `contact:5551234567`)
//! - `index:<name>`: index documents (for example `index:contacts`)
//! - `rate-limit:<client>`: rate-limit counters
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aetherlog_core::{Contact, ContactId, UserId};
//! use aetherlog_store::{IndexedEntity, MemoryStore, Storage};
//!
//! # async fn run() -> aetherlog_store::Result<()> {
//! let storage = Storage::new(Arc::new(MemoryStore::new()));
//!
//! let id = ContactId::new("(555) 123-4567").unwrap();
//! let owner = UserId::new("owner@example.com").unwrap();
//! IndexedEntity::<Contact>::create(&storage, Contact::new(id, "Jane Doe", "(555) 123-4567", owner)).await?;
//!
//! let contacts = IndexedEntity::<Contact>::list(&storage).await?;
//! assert_eq!(contacts.items.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod entities;
pub mod entity;
pub mod error;
pub mod keys;
pub mod memory;
pub mod rate_limit;
pub mod retry;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entities::{CallRecordEntity, ContactEntity, UserEntity};
pub use entity::{Entity, IndexedEntity, ListResult};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rate_limit::{
    RateLimitConfig, RateLimitDecision, RateLimitRecord, RateLimiter, TooManyRequests,
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS, TOO_MANY_REQUESTS_MESSAGE, TOO_MANY_REQUESTS_STATUS,
};
pub use retry::RetryPolicy;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

/// A stored document together with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    /// The document body.
    pub value: Value,
    /// Version of this document; 1 after the first write, bumped on every write.
    pub version: u64,
}

impl Versioned {
    /// Create a versioned document.
    #[must_use]
    pub fn new(value: Value, version: u64) -> Self {
        Self { value, version }
    }
}

/// The storage trait every backend implements.
///
/// Implementations must serialize operations on the same key while allowing
/// operations on different keys to run in parallel.
///
/// A key's version increases on every successful write, including writes
/// after a delete, so a version is never valid twice.
///
/// Logical contention is never an error: a losing
/// [`compare_and_swap`](DocumentStore::compare_and_swap) returns `Ok(false)`.
/// `Err` is reserved for infrastructure failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document.
    ///
    /// Returns `None` if the key was never written or has been deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Write a document unconditionally.
    ///
    /// Returns the new version: 1 for a fresh key, previous + 1 otherwise.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be written.
    async fn put(&self, key: &str, value: Value) -> Result<u64>;

    /// Write a document only if its current version equals `expected_version`.
    ///
    /// An `expected_version` of 0 means the key must be absent. Returns `true`
    /// and bumps the version on success, `false` without writing on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be accessed.
    async fn compare_and_swap(&self, key: &str, expected_version: u64, value: Value)
        -> Result<bool>;

    /// Remove a document. Returns whether anything was removed.
    ///
    /// The key's version keeps counting: a later write lands above every
    /// version the deleted document ever had.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be written.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Handle passed to entity operations: a store plus the retry policy its CAS
/// loops run under.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl Storage {
    /// Wrap a store with the default retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The retry policy for CAS loops.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
