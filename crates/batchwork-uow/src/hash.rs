//! Content hashing of entity snapshots using blake3.
//!
//! A snapshot is a `BTreeMap`, so fields are always visited in name order and
//! the same field values always produce the same hash. Each value is fed in
//! its compact JSON rendering, framed by a separator byte so that adjacent
//! fields cannot run into each other.

use batchwork_core::FieldMap;

/// Digest of an entity's field values.
pub type ContentHash = blake3::Hash;

/// Hashes a field snapshot.
pub fn hash_snapshot(snapshot: &FieldMap) -> ContentHash {
    let mut hasher = blake3::Hasher::new();
    for (field, value) in snapshot {
        hasher.update(field.as_bytes());
        hasher.update(&[0]);
        hasher.update(value.to_string().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}
