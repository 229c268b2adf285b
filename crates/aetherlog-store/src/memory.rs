//! In-memory storage implementation.
//!
//! `MemoryStore` keeps documents in a sharded concurrent map. Every operation
//! on a key runs under the lock of the shard holding that key, which gives the
//! per-key total ordering the [`DocumentStore`] contract requires while keys in
//! different shards proceed in parallel.
//!
//! Deleting a key leaves a tombstone holding its last version, so a key that is
//! deleted and written again never reuses a version a reader may still hold.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::Result;
use crate::{DocumentStore, Versioned};

/// One key's slot: the live document, or a tombstone when `value` is `None`.
#[derive(Debug)]
struct Slot {
    version: u64,
    value: Option<Value>,
}

impl Slot {
    fn live(&self) -> Option<Versioned> {
        self.value
            .as_ref()
            .map(|value| Versioned::new(value.clone(), self.version))
    }
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, Slot>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.iter().filter(|slot| slot.value.is_some()).count()
    }

    /// Whether the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        Ok(self.docs.get(key).and_then(|slot| slot.live()))
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64> {
        match self.docs.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                slot.version += 1;
                slot.value = Some(value);
                Ok(slot.version)
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot {
                    version: 1,
                    value: Some(value),
                });
                Ok(1)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected_version: u64,
        value: Value,
    ) -> Result<bool> {
        match self.docs.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                let current = if slot.value.is_some() { slot.version } else { 0 };
                if current != expected_version {
                    return Ok(false);
                }
                slot.version += 1;
                slot.value = Some(value);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Ok(false);
                }
                entry.insert(Slot {
                    version: 1,
                    value: Some(value),
                });
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self.docs.get_mut(key) {
            Some(mut slot) if slot.value.is_some() => {
                slot.version += 1;
                slot.value = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
