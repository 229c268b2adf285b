//! Indexed entities.
//!
//! An [`Entity`] is a domain record stored as one document per id, plus a
//! per-type index document listing the ids that currently exist.
//! [`IndexedEntity`] maintains both:
//!
//! - `create` writes the entity document, then adds the id to the index
//! - `delete` removes the entity document, then removes the id from the index
//! - `list` reads the index and then every entity it names
//!
//! The entity and index documents are separate keys, so they are updated in
//! two steps. Index updates run as a read-modify-CAS loop that retries until
//! it wins (bounded by the storage [`RetryPolicy`](crate::RetryPolicy));
//! concurrent creates of different ids all land in the index.
//!
//! A crash between the two steps can leave an index entry whose entity is
//! gone. `list` skips such entries and reports how many it skipped. The
//! opposite case, an entity missing from its index, is not repaired.

use std::fmt;
use std::marker::PhantomData;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::Storage;

/// Descriptor of a storable, indexed domain type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type. Its `Display` form is the document id.
    type Id: fmt::Display + Clone + Send + Sync;

    /// Entity type name, used as the key prefix of entity documents.
    const NAME: &'static str;

    /// Name of the index document for this type.
    const INDEX_NAME: &'static str;

    /// The state reported for an id that has no stored document.
    fn initial_state(id: &Self::Id) -> Self;

    /// This entity's id.
    fn id(&self) -> &Self::Id;
}

/// Result of listing an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T> {
    /// Entities in index order.
    pub items: Vec<T>,
    /// Index entries whose entity document was missing.
    pub skipped: usize,
}

/// The index document of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct IndexDocument {
    ids: Vec<String>,
}

impl IndexDocument {
    fn decode(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    fn encode(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Apply `change`; returns whether the document changed.
    fn apply(&mut self, change: IndexChange<'_>) -> bool {
        match change {
            IndexChange::Insert(id) => {
                if self.ids.iter().any(|existing| existing == id) {
                    return false;
                }
                self.ids.push(id.to_string());
                true
            }
            IndexChange::Remove(id) => {
                let before = self.ids.len();
                self.ids.retain(|existing| existing != id);
                self.ids.len() != before
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum IndexChange<'a> {
    Insert(&'a str),
    Remove(&'a str),
}

/// A handle on one entity of type `T`.
pub struct IndexedEntity<T: Entity> {
    storage: Storage,
    id: T::Id,
    key: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> IndexedEntity<T> {
    /// Bind a handle to the entity with `id`. Nothing is read until an
    /// operation is called.
    #[must_use]
    pub fn new(storage: &Storage, id: T::Id) -> Self {
        let key = keys::entity_key(T::NAME, &id.to_string());
        Self {
            storage: storage.clone(),
            id,
            key,
            _entity: PhantomData,
        }
    }

    /// The entity id this handle is bound to.
    #[must_use]
    pub fn id(&self) -> &T::Id {
        &self.id
    }

    /// Check whether the entity document exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.storage.store().get(&self.key).await?.is_some())
    }

    /// Read the entity, or its initial state if it has never been stored.
    ///
    /// A missing entity is not an error here; check [`exists`](Self::exists)
    /// first when absence matters.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the stored document
    /// does not decode as `T`.
    pub async fn get_state(&self) -> Result<T> {
        match self.storage.store().get(&self.key).await? {
            Some(doc) => Ok(serde_json::from_value(doc.value)?),
            None => Ok(T::initial_state(&self.id)),
        }
    }

    /// Shallow-merge the fields of `partial` into the stored entity.
    ///
    /// The merge is re-applied to the freshest stored state whenever a
    /// concurrent writer gets in first, so patches touching different fields
    /// never overwrite each other. The `id` field cannot be changed.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the entity does not exist.
    /// - `StoreError::InvalidPatch` if `partial` is not a JSON object or the
    ///   merged document is no longer a valid `T`.
    /// - `StoreError::RetriesExhausted` if every attempt lost its race.
    pub async fn patch(&self, partial: Value) -> Result<T> {
        let Value::Object(partial) = partial else {
            return Err(StoreError::InvalidPatch("patch must be a JSON object".into()));
        };

        let policy = *self.storage.retry_policy();
        for attempt in 1..=policy.attempts() {
            let current = self
                .storage
                .store()
                .get(&self.key)
                .await?
                .ok_or_else(|| self.not_found())?;

            let merged = self.merge(current.value, &partial)?;
            let value = serde_json::to_value(&merged)?;

            if self
                .storage
                .store()
                .compare_and_swap(&self.key, current.version, value)
                .await?
            {
                return Ok(merged);
            }

            tracing::debug!(
                entity = T::NAME,
                id = %self.id,
                attempt,
                "Patch lost CAS race, retrying"
            );
            policy.pause(attempt).await;
        }

        Err(StoreError::RetriesExhausted {
            key: self.key.clone(),
            attempts: policy.attempts(),
        })
    }

    /// Store a new entity and add it to the type's index.
    ///
    /// Exactly one of several concurrent creates of the same id succeeds; the
    /// others fail with `StoreError::AlreadyExists` and leave the stored
    /// entity untouched.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyExists` if an entity with this id is stored.
    /// - `StoreError::RetriesExhausted` if the index update kept losing races.
    ///   The entity document is written by then.
    pub async fn create(storage: &Storage, state: T) -> Result<T> {
        let id = state.id().to_string();
        let key = keys::entity_key(T::NAME, &id);
        let value = serde_json::to_value(&state)?;

        if !storage.store().compare_and_swap(&key, 0, value).await? {
            return Err(StoreError::AlreadyExists {
                entity: T::NAME,
                id,
            });
        }

        update_index(storage, T::INDEX_NAME, IndexChange::Insert(&id)).await?;

        tracing::debug!(entity = T::NAME, id = %id, "Entity created");
        Ok(state)
    }

    /// Delete an entity and remove it from the type's index.
    ///
    /// Returns `false`, leaving the index untouched, if the entity did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the index update kept losing races.
    pub async fn delete(storage: &Storage, id: &T::Id) -> Result<bool> {
        let id = id.to_string();
        let key = keys::entity_key(T::NAME, &id);

        if !storage.store().delete(&key).await? {
            return Ok(false);
        }

        update_index(storage, T::INDEX_NAME, IndexChange::Remove(&id)).await?;

        tracing::debug!(entity = T::NAME, id = %id, "Entity deleted");
        Ok(true)
    }

    /// List every entity named by the index, in index order.
    ///
    /// Index entries without an entity document are skipped and counted in
    /// [`ListResult::skipped`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a stored document does not
    /// decode as `T`.
    pub async fn list(storage: &Storage) -> Result<ListResult<T>> {
        let index = read_index(storage, T::INDEX_NAME).await?.0;

        let reads = index.ids.iter().map(|id| {
            let key = keys::entity_key(T::NAME, id);
            async move { storage.store().get(&key).await }
        });
        let docs = try_join_all(reads).await?;

        let mut items = Vec::with_capacity(docs.len());
        let mut skipped = 0;
        for doc in docs {
            match doc {
                Some(doc) => items.push(serde_json::from_value(doc.value)?),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(
                entity = T::NAME,
                index = T::INDEX_NAME,
                skipped,
                "Index references missing entity documents"
            );
        }

        Ok(ListResult { items, skipped })
    }

    fn merge(&self, current: Value, partial: &Map<String, Value>) -> Result<T> {
        let Value::Object(mut fields) = current else {
            return Err(StoreError::Serialization(format!(
                "{} document is not an object",
                self.key
            )));
        };

        for (name, value) in partial {
            fields.insert(name.clone(), value.clone());
        }
        fields.insert("id".to_string(), Value::String(self.id.to_string()));

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| StoreError::InvalidPatch(e.to_string()))
    }

    fn not_found(&self) -> StoreError {
        StoreError::NotFound {
            entity: T::NAME,
            id: self.id.to_string(),
        }
    }
}

impl<T: Entity> fmt::Debug for IndexedEntity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedEntity")
            .field("entity", &T::NAME)
            .field("key", &self.key)
            .finish()
    }
}

/// Read an index document and its version (0 when absent).
async fn read_index(storage: &Storage, index_name: &str) -> Result<(IndexDocument, u64)> {
    match storage.store().get(&keys::index_key(index_name)).await? {
        Some(doc) => Ok((IndexDocument::decode(doc.value)?, doc.version)),
        None => Ok((IndexDocument::default(), 0)),
    }
}

/// Apply `change` to an index document, re-reading and retrying whenever a
/// concurrent writer wins the CAS.
async fn update_index(storage: &Storage, index_name: &str, change: IndexChange<'_>) -> Result<()> {
    let key = keys::index_key(index_name);
    let policy = *storage.retry_policy();

    for attempt in 1..=policy.attempts() {
        let (mut index, version) = read_index(storage, index_name).await?;
        if !index.apply(change) {
            return Ok(());
        }

        if storage
            .store()
            .compare_and_swap(&key, version, index.encode()?)
            .await?
        {
            return Ok(());
        }

        tracing::debug!(index = index_name, attempt, ?change, "Index update lost CAS race, retrying");
        policy.pause(attempt).await;
    }

    tracing::warn!(index = index_name, attempts = policy.attempts(), "Index update gave up");
    Err(StoreError::RetriesExhausted {
        key,
        attempts: policy.attempts(),
    })
}
