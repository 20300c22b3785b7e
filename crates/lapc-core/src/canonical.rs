//! Deterministic JSON ordering and stable SHA-256 hashing.
//!
//! Canonicalization recursively sorts map keys lexicographically while
//! preserving list order, then renders compact (no-whitespace) JSON text
//! with no ASCII escaping of non-ASCII characters. All equality checks in
//! the optimization pipeline (delta diffing, hash comparison) go through
//! this canonical form rather than comparing `serde_json::Value` directly,
//! since `Value`'s `Map` does not guarantee key order round-trips.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sort object keys, leaving arrays and scalars untouched.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Render the canonical compact text form of a JSON value (no ASCII escaping).
pub fn canonical_text(value: &Value) -> String {
    // serde_json's compact Formatter already emits UTF-8 non-ASCII bytes
    // verbatim rather than escaping them, matching the canonical contract.
    serde_json::to_string(&canonicalize(value)).expect("canonicalized Value always serializes")
}

/// SHA-256 of the canonical text form, as lowercase hex.
pub fn stable_hash_hex(value: &Value) -> String {
    let text = canonical_text(value);
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}

/// Minimal hex encoder so the crate does not need the `hex` dependency for
/// this one call site.
mod hex {
    const TABLE: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push(TABLE[(b >> 4) as usize] as char);
            out.push(TABLE[(b & 0x0f) as usize] as char);
        }
        out
    }
}

/// Two values are canonically equal iff their canonical text forms match.
pub fn canonically_equal(a: &Value, b: &Value) -> bool {
    canonical_text(a) == canonical_text(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_recursively() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}});
        assert_eq!(canonical_text(&value), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_text(&value), "[3,1,2]");
    }

    #[test]
    fn hash_is_deterministic_regardless_of_key_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(stable_hash_hex(&a), stable_hash_hex(&b));
        assert_eq!(stable_hash_hex(&a).len(), 64);
    }

    #[test]
    fn canonically_equal_ignores_key_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert!(canonically_equal(&a, &b));
        assert!(!canonically_equal(&a, &json!({"a": 1, "b": 3})));
    }

    #[test]
    fn does_not_escape_non_ascii() {
        let value = json!({"name": "héllo"});
        assert!(canonical_text(&value).contains("héllo"));
    }
}
