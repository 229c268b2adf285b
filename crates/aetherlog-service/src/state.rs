//! Application state.

use std::sync::Arc;

use aetherlog_store::{
    Clock, DocumentStore, MemoryStore, RateLimiter, Storage, StoreError, SystemClock,
};

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The document store and its CAS retry policy.
    pub storage: Storage,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Limiter guarding the account endpoints.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Create a new application state over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: ServiceConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a new application state whose rate limiter reads `clock`.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let storage = Storage::new(store.clone()).with_retry_policy(config.retry);
        let rate_limiter = RateLimiter::with_clock(store, config.rate_limit, clock);

        if let Some(email) = &config.bootstrap_admin_email {
            tracing::info!(email = %email, "Bootstrap administrator configured");
        }

        Self {
            storage,
            config,
            rate_limiter,
        }
    }

    /// Open the configured storage backend and build the state on it.
    ///
    /// Uses `RocksDB` when the `rocksdb-backend` feature is enabled and a data
    /// directory is configured, otherwise an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(config: ServiceConfig) -> Result<Self, StoreError> {
        let store = open_store(&config)?;
        Ok(Self::new(store, config))
    }

    /// Count a request from `client` against the rate limit.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::TooManyRequests` once the client is over its
    /// allowance, or `ApiError::Internal` if the store is unavailable.
    pub async fn check_rate_limit(&self, client: &str) -> Result<(), ApiError> {
        self.rate_limiter.check(client).await?.into_result()?;
        Ok(())
    }
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match &config.data_dir {
        Some(dir) => {
            let store = aetherlog_store::RocksStore::open(dir)?;
            tracing::info!(data_dir = %dir, "RocksDB store opened");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATA_DIR not set - documents are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(not(feature = "rocksdb-backend"))]
#[allow(clippy::unnecessary_wraps)]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    if let Some(dir) = &config.data_dir {
        tracing::warn!(
            data_dir = %dir,
            "Built without rocksdb-backend - ignoring DATA_DIR, documents are kept in memory only"
        );
    }
    Ok(Arc::new(MemoryStore::new()))
}
