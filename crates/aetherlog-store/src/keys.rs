//! Key encoding utilities.
//!
//! Every document lives in one flat key space; the prefixes below keep entity
//! documents, index documents and rate-limit counters apart.

/// Prefix of index document keys.
pub const INDEX_PREFIX: &str = "index";

/// Prefix of rate-limit counter keys.
pub const RATE_LIMIT_PREFIX: &str = "rate-limit";

/// Create an entity document key.
///
/// Format: `<entity_name>:<id>`
#[must_use]
pub fn entity_key(entity_name: &str, id: &str) -> String {
    format!("{entity_name}:{id}")
}

/// Create the key of an entity type's index document.
#[must_use]
pub fn index_key(index_name: &str) -> String {
    format!("{INDEX_PREFIX}:{index_name}")
}

/// Create a rate-limit counter key for a client identifier.
#[must_use]
pub fn rate_limit_key(client: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}:{client}")
}
