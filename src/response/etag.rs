//! Content fingerprints for conditional GET

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Rebuild `value` with every object's keys in sorted order.
///
/// Two payloads that differ only in key order canonicalize to the same
/// value, so their ETags match.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Uppercase hex SHA-256 of the canonical JSON serialization of `value`
pub fn compute_etag(value: &Value) -> String {
    // Serializing a Value cannot fail: keys are always strings
    let bytes = serde_json::to_vec(&canonicalize(value)).unwrap_or_default();
    hex::encode_upper(Sha256::digest(&bytes))
}

/// Whether an `If-None-Match` value matches `etag` exactly
pub fn matches(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|candidate| candidate == etag)
}
