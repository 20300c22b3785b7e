//! Tools-hash-sync helpers: ETag-style conditional fetch for `tools/list`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::canonical::canonicalize;

static WIRE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([a-z0-9_]+):([0-9a-f]{64})$").unwrap());

/// Compute the wire-format hash (`sha256:<hex>`) of a visible tools payload.
///
/// When `include_server_fingerprint` is set, hashes
/// `{"tools": <payload>, "server_fingerprint": <fp>}` instead of the bare
/// payload.
pub fn compute_tools_hash(
    tools_payload: &Value,
    include_server_fingerprint: bool,
    server_fingerprint: &str,
) -> String {
    let payload = canonicalize(tools_payload);
    let preimage = if include_server_fingerprint {
        serde_json::json!({
            "tools": payload,
            "server_fingerprint": server_fingerprint,
        })
    } else {
        payload
    };
    let digest = crate::canonical::stable_hash_hex(&preimage);
    format!("sha256:{digest}")
}

/// Validate and normalize a client-supplied `if_none_match` value.
/// Returns `None` for wrong algorithm, malformed hex, or non-string input.
pub fn parse_if_none_match(value: &Value, expected_algorithm: &str) -> Option<String> {
    let text = value.as_str()?;
    let candidate = text.trim().to_lowercase();
    let caps = WIRE_RE.captures(&candidate)?;
    if &caps[1] != expected_algorithm {
        return None;
    }
    Some(candidate)
}
