//! Canonical BLAKE3 hashing for deterministic content identity.
//!
//! Values are converted to `serde_json::Value`, object keys are re-ordered
//! through a `BTreeMap`, and the compact encoding is hashed. Two values that
//! serialize to the same JSON tree always hash identically regardless of
//! map insertion order.

use std::collections::BTreeMap;

use serde::Serialize;

/// Lowercase hex BLAKE3 digest of the canonical JSON form of `value`.
///
/// Returns `None` only if `value` cannot be represented as JSON
/// (e.g. a map with non-string keys).
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Option<String> {
    let bytes = canonical_bytes(value)?;
    Some(blake3::hash(&bytes).to_hex().to_string())
}

/// Compact canonical JSON bytes with sorted object keys.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Option<Vec<u8>> {
    let json = serde_json::to_value(value).ok()?;
    serde_json::to_vec(&canonicalize(json)).ok()
}

/// Hash a sequence of already-canonical parts, separated so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn hash_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        serde_json::Value::Object(obj) => {
            let sorted: BTreeMap<String, serde_json::Value> = obj
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        other => other,
    }
}
