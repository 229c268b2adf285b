//! Indexed entity integration tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use aetherlog_core::{CallDirection, CallRecord, Contact, ContactId, Role, User, UserId};
use aetherlog_store::{
    CallRecordEntity, ContactEntity, DocumentStore, MemoryStore, Result, RetryPolicy, Storage,
    StoreError, UserEntity, Versioned,
};

// ============================================================================
// Helpers
// ============================================================================

fn memory_storage() -> (Storage, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Storage::new(store.clone()), store)
}

fn owner() -> UserId {
    UserId::new("owner@example.com").unwrap()
}

fn contact(phone: &str, name: &str) -> Contact {
    Contact::new(ContactId::new(phone).unwrap(), name, phone, owner())
}

fn user(email: &str, name: &str, role: Role) -> User {
    User::new(UserId::new(email).unwrap(), name, "hash".into(), role)
}

/// Store wrapper that makes the first `losses` CAS calls on `key` fail as if a
/// concurrent writer got there first.
struct ContendedStore {
    inner: MemoryStore,
    key: String,
    losses: AtomicU32,
}

impl ContendedStore {
    fn new(key: &str, losses: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            key: key.to_string(),
            losses: AtomicU32::new(losses),
        }
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64> {
        self.inner.put(key, value).await
    }

    async fn compare_and_swap(&self, key: &str, expected: u64, value: Value) -> Result<bool> {
        if key == self.key
            && self
                .losses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Ok(false);
        }
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }
}

/// Store wrapper that, right before the first conditional update of an
/// existing user, deletes that user and registers a new one under the same id.
struct ReregisteringStore {
    inner: Arc<MemoryStore>,
    replacement: User,
    armed: AtomicBool,
}

#[async_trait]
impl DocumentStore for ReregisteringStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64> {
        self.inner.put(key, value).await
    }

    async fn compare_and_swap(&self, key: &str, expected: u64, value: Value) -> Result<bool> {
        if key.starts_with("user:") && expected != 0 && self.armed.swap(false, Ordering::SeqCst) {
            let storage = Storage::new(self.inner.clone());
            UserEntity::delete(&storage, &self.replacement.id).await?;
            UserEntity::create(&storage, self.replacement.clone()).await?;
        }
        self.inner.compare_and_swap(key, expected, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }
}

/// Store whose backend is down.
struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Versioned>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn put(&self, _key: &str, _value: Value) -> Result<u64> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn compare_and_swap(&self, _key: &str, _expected: u64, _value: Value) -> Result<bool> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_micros(100),
        max_backoff: Duration::from_millis(1),
    }
}

// ============================================================================
// Create / Read
// ============================================================================

#[tokio::test]
async fn create_then_read_back() {
    let (storage, _store) = memory_storage();
    let created = ContactEntity::create(&storage, contact("(555) 123-4567", "Jane Doe"))
        .await
        .unwrap();

    let entity = ContactEntity::new(&storage, ContactId::new("5551234567").unwrap());
    assert!(entity.exists().await.unwrap());
    assert_eq!(entity.get_state().await.unwrap(), created);
}

#[tokio::test]
async fn stored_document_embeds_id_under_derived_key() {
    let (storage, store) = memory_storage();
    ContactEntity::create(&storage, contact("555-000-1111", "Sam"))
        .await
        .unwrap();

    let doc = store.get("contact:5550001111").await.unwrap().unwrap();
    assert_eq!(doc.value["id"], "5550001111");
    assert_eq!(doc.version, 1);

    let index = store.get("index:contacts").await.unwrap().unwrap();
    assert_eq!(index.value, json!({ "ids": ["5550001111"] }));
}

#[tokio::test]
async fn get_state_of_missing_entity_is_initial_state() {
    let (storage, _store) = memory_storage();
    let id = UserId::new("ghost@example.com").unwrap();
    let entity = UserEntity::new(&storage, id.clone());

    assert!(!entity.exists().await.unwrap());
    assert_eq!(entity.get_state().await.unwrap(), User::empty(id));
}

#[tokio::test]
async fn get_state_is_repeatable() {
    let (storage, _store) = memory_storage();
    let created = UserEntity::create(&storage, user("a@example.com", "A", Role::User))
        .await
        .unwrap();

    let entity = UserEntity::new(&storage, created.id.clone());
    let first = entity.get_state().await.unwrap();
    let second = entity.get_state().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn create_existing_id_fails_without_overwriting() {
    let (storage, _store) = memory_storage();
    ContactEntity::create(&storage, contact("5551234567", "First"))
        .await
        .unwrap();

    let result = ContactEntity::create(&storage, contact("5551234567", "Second")).await;
    assert!(matches!(
        result,
        Err(StoreError::AlreadyExists { entity: "contact", .. })
    ));

    let state = ContactEntity::new(&storage, ContactId::new("5551234567").unwrap())
        .get_state()
        .await
        .unwrap();
    assert_eq!(state.name, "First");
    assert_eq!(ContactEntity::list(&storage).await.unwrap().items.len(), 1);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creates_all_land_in_index() {
    let (storage, _store) = memory_storage();

    let mut tasks = Vec::new();
    for i in 0..50 {
        let storage = storage.clone();
        tasks.push(tokio::spawn(async move {
            let record = CallRecord::new(
                ContactId::new("5551234567").unwrap(),
                CallDirection::Inbound,
                format!("2024-01-01T00:00:{:02}Z", i % 60),
                owner(),
            );
            CallRecordEntity::create(&storage, record).await.unwrap().id
        }));
    }

    let mut created = HashSet::new();
    for task in tasks {
        created.insert(task.await.unwrap());
    }

    let listed = CallRecordEntity::list(&storage).await.unwrap();
    assert_eq!(listed.skipped, 0);
    assert_eq!(listed.items.len(), 50);
    let listed_ids: HashSet<_> = listed.items.iter().map(|r| r.id).collect();
    assert_eq!(listed_ids, created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_same_contact_have_one_winner() {
    let (storage, _store) = memory_storage();

    let a = {
        let storage = storage.clone();
        tokio::spawn(async move { ContactEntity::create(&storage, contact("5551234567", "Alice")).await })
    };
    let b = {
        let storage = storage.clone();
        tokio::spawn(async move { ContactEntity::create(&storage, contact("5551234567", "Bob")).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(StoreError::AlreadyExists { .. }))));

    let listed = ContactEntity::list(&storage).await.unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].name, winners[0].name);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_patches_on_disjoint_fields_are_all_kept() {
    let (storage, _store) = memory_storage();
    let created = UserEntity::create(&storage, user("a@example.com", "Original", Role::Admin))
        .await
        .unwrap();

    let role_patch = {
        let entity = UserEntity::new(&storage, created.id.clone());
        tokio::spawn(async move { entity.patch(json!({ "role": "user" })).await })
    };
    let name_patch = {
        let entity = UserEntity::new(&storage, created.id.clone());
        tokio::spawn(async move { entity.patch(json!({ "name": "X" })).await })
    };
    role_patch.await.unwrap().unwrap();
    name_patch.await.unwrap().unwrap();

    let state = UserEntity::new(&storage, created.id.clone())
        .get_state()
        .await
        .unwrap();
    assert_eq!(state.role, Some(Role::User));
    assert_eq!(state.name, "X");
    assert_eq!(state.password_hash.as_deref(), Some("hash"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn every_concurrent_patch_is_applied_once() {
    let (storage, store) = memory_storage();
    UserEntity::create(&storage, user("a@example.com", "A", Role::User))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let entity = UserEntity::new(&storage, UserId::new("a@example.com").unwrap());
        tasks.push(tokio::spawn(async move {
            entity.patch(json!({ "name": format!("name-{i}") })).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let doc = store.get("user:a@example.com").await.unwrap().unwrap();
    assert_eq!(doc.version, 21);
}

// ============================================================================
// Patch
// ============================================================================

#[tokio::test]
async fn patch_missing_entity_is_not_found() {
    let (storage, _store) = memory_storage();
    let entity = UserEntity::new(&storage, UserId::new("ghost@example.com").unwrap());

    let result = entity.patch(json!({ "name": "Ghost" })).await;
    assert!(matches!(result, Err(StoreError::NotFound { entity: "user", .. })));
    assert!(!entity.exists().await.unwrap());
}

#[tokio::test]
async fn patch_cannot_change_id() {
    let (storage, _store) = memory_storage();
    let created = UserEntity::create(&storage, user("a@example.com", "A", Role::User))
        .await
        .unwrap();

    let patched = UserEntity::new(&storage, created.id.clone())
        .patch(json!({ "id": "b@example.com", "name": "B" }))
        .await
        .unwrap();
    assert_eq!(patched.id, created.id);
    assert_eq!(patched.name, "B");
}

#[tokio::test]
async fn patch_rejects_non_object_and_invalid_fields() {
    let (storage, store) = memory_storage();
    let created = UserEntity::create(&storage, user("a@example.com", "A", Role::User))
        .await
        .unwrap();
    let entity = UserEntity::new(&storage, created.id.clone());

    assert!(matches!(
        entity.patch(json!(["not", "an", "object"])).await,
        Err(StoreError::InvalidPatch(_))
    ));
    assert!(matches!(
        entity.patch(json!({ "role": "superuser" })).await,
        Err(StoreError::InvalidPatch(_))
    ));

    let doc = store.get("user:a@example.com").await.unwrap().unwrap();
    assert_eq!(doc.version, 1);
}

#[tokio::test]
async fn patch_retries_after_lost_race() {
    let store = Arc::new(ContendedStore::new("user:b@example.com", 0));
    let storage = Storage::new(store.clone()).with_retry_policy(fast_retry(10));
    UserEntity::create(&storage, user("b@example.com", "B", Role::User))
        .await
        .unwrap();
    store.losses.store(4, Ordering::SeqCst);

    let patched = UserEntity::new(&storage, UserId::new("b@example.com").unwrap())
        .patch(json!({ "name": "Patched" }))
        .await
        .unwrap();
    assert_eq!(patched.name, "Patched");
    assert_eq!(store.losses.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn patch_never_lands_on_reregistered_entity() {
    let inner = Arc::new(MemoryStore::new());
    let id = UserId::new("c@example.com").unwrap();
    let store = Arc::new(ReregisteringStore {
        inner: inner.clone(),
        replacement: User::new(id.clone(), "New Owner", "newhash".into(), Role::User),
        armed: AtomicBool::new(false),
    });
    let storage = Storage::new(store.clone()).with_retry_policy(fast_retry(10));
    UserEntity::create(
        &storage,
        User::new(id.clone(), "Old Owner", "oldhash".into(), Role::Admin),
    )
    .await
    .unwrap();
    store.armed.store(true, Ordering::SeqCst);

    let patched = UserEntity::new(&storage, id.clone())
        .patch(json!({ "name": "Renamed" }))
        .await
        .unwrap();
    assert!(!store.armed.load(Ordering::SeqCst));

    // The rename is re-applied to the new account, not the deleted one.
    assert_eq!(patched.name, "Renamed");
    assert_eq!(patched.password_hash.as_deref(), Some("newhash"));
    assert_eq!(patched.role, Some(Role::User));

    let stored = UserEntity::new(&Storage::new(inner), id).get_state().await.unwrap();
    assert_eq!(stored, patched);
}

#[tokio::test]
async fn patch_gives_up_after_budget() {
    let store = Arc::new(ContendedStore::new("user:b@example.com", 0));
    let storage = Storage::new(store.clone()).with_retry_policy(fast_retry(2));
    UserEntity::create(&storage, user("b@example.com", "B", Role::User))
        .await
        .unwrap();
    store.losses.store(u32::MAX, Ordering::SeqCst);

    let err = UserEntity::new(&storage, UserId::new("b@example.com").unwrap())
        .patch(json!({ "name": "Patched" }))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RetriesExhausted { attempts: 2, .. }));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn delete_removes_entity_and_index_entry() {
    let (storage, store) = memory_storage();
    ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap();
    ContactEntity::create(&storage, contact("5559876543", "John"))
        .await
        .unwrap();

    let id = ContactId::new("5551234567").unwrap();
    assert!(ContactEntity::delete(&storage, &id).await.unwrap());
    assert!(!ContactEntity::new(&storage, id).exists().await.unwrap());

    let index = store.get("index:contacts").await.unwrap().unwrap();
    assert_eq!(index.value, json!({ "ids": ["5559876543"] }));
}

#[tokio::test]
async fn delete_missing_entity_leaves_index_alone() {
    let (storage, store) = memory_storage();
    ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap();
    let before = store.get("index:contacts").await.unwrap().unwrap();

    let deleted = ContactEntity::delete(&storage, &ContactId::new("5550000000").unwrap())
        .await
        .unwrap();
    assert!(!deleted);

    let after = store.get("index:contacts").await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn deleted_entity_can_be_recreated() {
    let (storage, _store) = memory_storage();
    let id = ContactId::new("5551234567").unwrap();
    ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap();
    ContactEntity::delete(&storage, &id).await.unwrap();
    ContactEntity::create(&storage, contact("5551234567", "Janet"))
        .await
        .unwrap();

    let listed = ContactEntity::list(&storage).await.unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].name, "Janet");
}

// ============================================================================
// Index maintenance
// ============================================================================

#[tokio::test]
async fn index_update_retries_until_it_wins() {
    let store = Arc::new(ContendedStore::new("index:contacts", 5));
    let storage = Storage::new(store.clone()).with_retry_policy(fast_retry(10));

    ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap();

    assert_eq!(store.losses.load(Ordering::SeqCst), 0);
    let listed = ContactEntity::list(&storage).await.unwrap();
    assert_eq!(listed.items.len(), 1);
}

#[tokio::test]
async fn index_update_gives_up_after_budget() {
    let store = Arc::new(ContendedStore::new("index:contacts", u32::MAX));
    let storage = Storage::new(store.clone()).with_retry_policy(fast_retry(3));

    let err = ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert!(matches!(
        err,
        StoreError::RetriesExhausted { ref key, attempts: 3 } if key == "index:contacts"
    ));

    // The entity document was written before the index update gave up.
    assert!(ContactEntity::new(&storage, ContactId::new("5551234567").unwrap())
        .exists()
        .await
        .unwrap());
}

#[tokio::test]
async fn list_skips_index_entries_without_documents() {
    let (storage, store) = memory_storage();
    ContactEntity::create(&storage, contact("5551234567", "Jane"))
        .await
        .unwrap();
    // Simulate a crash between deleting an entity and updating the index.
    store.delete("contact:5551234567").await.unwrap();
    ContactEntity::create(&storage, contact("5559876543", "John"))
        .await
        .unwrap();

    let listed = ContactEntity::list(&storage).await.unwrap();
    assert_eq!(listed.skipped, 1);
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].name, "John");
}

#[tokio::test]
async fn list_of_empty_type_is_empty() {
    let (storage, _store) = memory_storage();
    let listed = UserEntity::list(&storage).await.unwrap();
    assert!(listed.items.is_empty());
    assert_eq!(listed.skipped, 0);
}

#[tokio::test]
async fn list_preserves_creation_order() {
    let (storage, _store) = memory_storage();
    for (phone, name) in [("111", "One"), ("222", "Two"), ("333", "Three")] {
        ContactEntity::create(&storage, contact(phone, name))
            .await
            .unwrap();
    }

    let names: Vec<_> = ContactEntity::list(&storage)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["One", "Two", "Three"]);
}

#[tokio::test]
async fn storage_failures_surface_as_unavailable() {
    let storage = Storage::new(Arc::new(UnavailableStore));

    let err = UserEntity::list(&storage).await.unwrap_err();
    assert!(err.is_unavailable());

    let err = UserEntity::new(&storage, UserId::new("a@example.com").unwrap())
        .exists()
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}
