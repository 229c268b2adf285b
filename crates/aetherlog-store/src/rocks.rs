//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `DocumentStore` trait.
//!
//! Each document is stored as a CBOR-encoded `{version, value}` record. `RocksDB`
//! has no compare-and-swap of its own, so every write goes through a striped
//! lock table: operations on the same key take the same stripe and run one at a
//! time, while keys on different stripes proceed in parallel.
//!
//! A delete overwrites the record with a tombstone that keeps the version
//! counter, so a recreated key carries on from where the deleted one stopped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::{DocumentStore, Versioned};

/// Column family holding every document.
const DOCUMENTS_CF: &str = "documents";

/// Number of lock stripes serializing writes.
const LOCK_STRIPES: usize = 64;

/// On-disk record of one document.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u64,
    value: Value,
    #[serde(default)]
    deleted: bool,
}

impl StoredDocument {
    fn live(version: u64, value: Value) -> Self {
        Self {
            version,
            value,
            deleted: false,
        }
    }

    /// Version a conditional write must name: 0 for a tombstone.
    fn current_version(&self) -> u64 {
        if self.deleted {
            0
        } else {
            self.version
        }
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    stripes: Vec<Mutex<()>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let documents = ColumnFamilyDescriptor::new(DOCUMENTS_CF, Options::default());
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, vec![documents])
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    fn documents(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(DOCUMENTS_CF)
            .ok_or_else(|| StoreError::Unavailable(format!("column family not found: {DOCUMENTS_CF}")))
    }

    /// Lock stripe guarding `key`.
    fn stripe(&self, key: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Truncation is fine: only the low bits pick a stripe.
        #[allow(clippy::cast_possible_truncation)]
        let slot = hasher.finish() as usize % self.stripes.len();
        &self.stripes[slot]
    }

    /// Serialize a document using CBOR.
    fn serialize(doc: &StoredDocument) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(doc, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a document from CBOR.
    fn deserialize(data: &[u8]) -> Result<StoredDocument> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read(&self, key: &str) -> Result<Option<StoredDocument>> {
        let cf = self.documents()?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn write(&self, key: &str, doc: &StoredDocument) -> Result<()> {
        let cf = self.documents()?;
        let value = Self::serialize(doc)?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RocksStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        Ok(self
            .read(key)?
            .filter(|doc| !doc.deleted)
            .map(|doc| Versioned::new(doc.value, doc.version)))
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64> {
        let _guard = self.stripe(key).lock();

        let version = self.read(key)?.map_or(0, |doc| doc.version) + 1;
        self.write(key, &StoredDocument::live(version, value))?;

        Ok(version)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: Value,
    ) -> Result<bool> {
        let _guard = self.stripe(key).lock();

        let stored = self.read(key)?;
        if stored.as_ref().map_or(0, StoredDocument::current_version) != expected_version {
            return Ok(false);
        }

        let version = stored.map_or(0, |doc| doc.version) + 1;
        self.write(key, &StoredDocument::live(version, value))?;

        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.stripe(key).lock();

        let Some(doc) = self.read(key)?.filter(|doc| !doc.deleted) else {
            return Ok(false);
        };

        self.write(
            key,
            &StoredDocument {
                version: doc.version + 1,
                value: Value::Null,
                deleted: true,
            },
        )?;

        Ok(true)
    }
}
