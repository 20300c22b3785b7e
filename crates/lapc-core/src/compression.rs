//! Generic reversible result-compression envelope (`lapc-json-v1`).
//!
//! Replaces frequent map keys with short numeric aliases, optionally
//! recodes homogeneous lists of objects into a columnar `{"~t": {c, r}}`
//! block, and optionally strips null/defaultish entries. The registry that
//! lets repeated envelopes omit the alias dictionary on the wire lives in
//! `lapc-state`; this module only computes the content-hash reference a
//! registry is keyed by.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProxyError, Result};

pub const RESULT_ENCODING: &str = "lapc-json-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    Off,
    Balanced,
    Aggressive,
}

impl CompressionMode {
    fn min_key_frequency(self) -> usize {
        match self {
            CompressionMode::Aggressive => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionOptions {
    pub mode: CompressionMode,
    pub strip_nulls: bool,
    pub strip_defaults: bool,
    pub min_payload_bytes: usize,
    pub enable_columnar: bool,
    pub columnar_min_rows: usize,
    pub columnar_min_fields: usize,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            mode: CompressionMode::Balanced,
            strip_nulls: false,
            strip_defaults: false,
            min_payload_bytes: 512,
            enable_columnar: true,
            columnar_min_rows: 8,
            columnar_min_fields: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub encoding: String,
    pub compressed: bool,
    pub mode: CompressionMode,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub saved_bytes: i64,
    pub saved_ratio: f64,
    pub data: Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub keys: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_ref: Option<String>,
}

fn json_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

fn passthrough_envelope(input: &Value, original_bytes: usize) -> ResultEnvelope {
    ResultEnvelope {
        encoding: RESULT_ENCODING.to_string(),
        compressed: false,
        mode: CompressionMode::Off,
        original_bytes,
        compressed_bytes: original_bytes,
        saved_bytes: 0,
        saved_ratio: 0.0,
        data: input.clone(),
        keys: HashMap::new(),
        keys_ref: None,
    }
}

fn collect_key_frequency(node: &Value, counter: &mut HashMap<String, usize>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                *counter.entry(key.clone()).or_insert(0) += 1;
                collect_key_frequency(value, counter);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_key_frequency(item, counter);
            }
        }
        _ => {}
    }
}

fn build_key_aliases(counter: &HashMap<String, usize>, mode: CompressionMode) -> HashMap<String, String> {
    if mode == CompressionMode::Off {
        return HashMap::new();
    }
    let min_freq = mode.min_key_frequency();
    let mut candidates: Vec<(&String, usize)> = counter
        .iter()
        .filter(|(k, freq)| **freq >= min_freq && k.len() > 2)
        .map(|(k, freq)| (k, *freq))
        .collect();
    // Rank by (frequency desc, length desc) -> sort ascending then reverse,
    // matching "prioritize repetitive long keys" from the source ranking.
    candidates.sort_by(|a, b| (a.1, a.0.len()).cmp(&(b.1, b.0.len())));
    candidates.reverse();

    let mut aliases = HashMap::new();
    for (idx, (key, _)) in candidates.into_iter().enumerate() {
        let alias = format!("k{idx}");
        if alias.len() < key.len() {
            aliases.insert(key.clone(), alias);
        }
    }
    aliases
}

fn is_defaultish(value: &Value) -> bool {
    matches!(value, Value::Null)
        || matches!(value, Value::String(s) if s.is_empty())
        || matches!(value, Value::Number(n) if n.as_f64() == Some(0.0))
        || matches!(value, Value::Bool(false))
        || matches!(value, Value::Array(a) if a.is_empty())
        || matches!(value, Value::Object(o) if o.is_empty())
}

fn can_columnar<'a>(items: &'a [Value], opts: &CompressionOptions) -> Option<Vec<&'a str>> {
    if !opts.enable_columnar || items.len() < opts.columnar_min_rows {
        return None;
    }
    let first = items.first()?.as_object()?;
    let mut first_keys: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    if first_keys.len() < opts.columnar_min_fields {
        return None;
    }
    first_keys.sort_unstable();
    for item in &items[1..] {
        let obj = item.as_object()?;
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        if keys != first_keys {
            return None;
        }
    }
    // Preserve the first row's original key order for column emission.
    Some(first.keys().map(|k| k.as_str()).collect())
}

fn encode(node: &Value, key_alias: &HashMap<String, String>, opts: &CompressionOptions) -> Value {
    match node {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                if opts.strip_nulls && value.is_null() {
                    continue;
                }
                if opts.strip_defaults
                    && matches!(key.to_lowercase().as_str(), "default" | "defaults")
                    && is_defaultish(value)
                {
                    continue;
                }
                let encoded_key = key_alias.get(key).cloned().unwrap_or_else(|| key.clone());
                out.insert(encoded_key, encode(value, key_alias, opts));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            if let Some(columns) = can_columnar(items, opts) {
                let encoded_columns: Vec<String> = columns
                    .iter()
                    .map(|c| key_alias.get(*c).cloned().unwrap_or_else(|| c.to_string()))
                    .collect();
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    let obj = item.as_object().expect("validated by can_columnar");
                    let row: Vec<Value> = columns
                        .iter()
                        .map(|c| encode(obj.get(*c).unwrap_or(&Value::Null), key_alias, opts))
                        .collect();
                    rows.push(Value::Array(row));
                }
                let mut t = serde_json::Map::new();
                t.insert("c".to_string(), Value::Array(encoded_columns.into_iter().map(Value::String).collect()));
                t.insert("r".to_string(), Value::Array(rows));
                let mut out = serde_json::Map::new();
                out.insert("~t".to_string(), Value::Object(t));
                return Value::Object(out);
            }
            Value::Array(items.iter().map(|v| encode(v, key_alias, opts)).collect())
        }
        other => other.clone(),
    }
}

fn decode(node: &Value, alias_to_key: &HashMap<String, String>) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(Value::Object(meta)) = map.get("~t") {
                let columns: Vec<String> = meta
                    .get("c")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let rows = meta.get("r").and_then(|v| v.as_array()).cloned().unwrap_or_default();
                let decoded_cols: Vec<String> = columns
                    .iter()
                    .map(|c| alias_to_key.get(c).cloned().unwrap_or_else(|| c.clone()))
                    .collect();
                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let Some(row) = row.as_array() else { continue };
                    let mut obj = serde_json::Map::new();
                    for (idx, col) in decoded_cols.iter().enumerate() {
                        if let Some(value) = row.get(idx) {
                            obj.insert(col.clone(), decode(value, alias_to_key));
                        }
                    }
                    out.push(Value::Object(obj));
                }
                return Value::Array(out);
            }
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                let decoded_key = alias_to_key.get(key).cloned().unwrap_or_else(|| key.clone());
                out.insert(decoded_key, decode(value, alias_to_key));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| decode(v, alias_to_key)).collect()),
        other => other.clone(),
    }
}

/// Content-hash reference for an alias table, `kdict-<first 12 hex>`.
pub fn key_ref(alias_to_key: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<&String, &String> = alias_to_key.iter().collect();
    let value = serde_json::to_value(&sorted).unwrap_or(Value::Null);
    let digest = crate::canonical::stable_hash_hex(&value);
    format!("kdict-{}", &digest[..12])
}

/// Compress a value without cross-call registry interaction (`keys` is
/// always emitted in full; callers needing `keysRef` omission wire this up
/// against a shared registry themselves, then strip `keys`).
pub fn compress_result(input: &Value, opts: &CompressionOptions) -> ResultEnvelope {
    let original_bytes = json_size(input);
    if original_bytes < opts.min_payload_bytes || opts.mode == CompressionMode::Off {
        return passthrough_envelope(input, original_bytes);
    }

    let mut key_counter = HashMap::new();
    collect_key_frequency(input, &mut key_counter);
    let key_alias = build_key_aliases(&key_counter, opts.mode);
    let encoded = encode(input, &key_alias, opts);
    let alias_to_key: HashMap<String, String> =
        key_alias.into_iter().map(|(k, v)| (v, k)).collect();

    let mut envelope = ResultEnvelope {
        encoding: RESULT_ENCODING.to_string(),
        compressed: true,
        mode: opts.mode,
        original_bytes,
        compressed_bytes: 0,
        saved_bytes: 0,
        saved_ratio: 0.0,
        data: encoded,
        keys: alias_to_key,
        keys_ref: None,
    };

    let compressed_bytes = serde_json::to_string(&envelope).map(|s| s.len()).unwrap_or(original_bytes);
    let saved = original_bytes as i64 - compressed_bytes as i64;
    envelope.compressed_bytes = compressed_bytes;
    envelope.saved_bytes = saved;
    envelope.saved_ratio = if original_bytes > 0 {
        saved as f64 / original_bytes as f64
    } else {
        0.0
    };

    if saved <= 0 {
        return passthrough_envelope(input, original_bytes);
    }
    envelope
}

/// Reverse a compression envelope. `registry_lookup` resolves a `keysRef`
/// when the envelope omitted `keys` (shared-dictionary reuse).
pub fn decompress_result(
    envelope: &ResultEnvelope,
    registry_lookup: impl FnOnce(&str) -> Option<HashMap<String, String>>,
) -> Result<Value> {
    if envelope.encoding != RESULT_ENCODING {
        return Err(ProxyError::UpstreamProtocol(format!(
            "unsupported compression encoding: {}",
            envelope.encoding
        )));
    }
    if !envelope.compressed {
        return Ok(envelope.data.clone());
    }
    let keys = if !envelope.keys.is_empty() {
        envelope.keys.clone()
    } else if let Some(keys_ref) = &envelope.keys_ref {
        registry_lookup(keys_ref).ok_or_else(|| {
            ProxyError::Optimization("compression envelope keysRef not found in registry".to_string())
        })?
    } else {
        return Err(ProxyError::Optimization(
            "compression envelope has neither keys nor keysRef".to_string(),
        ));
    };
    Ok(decode(&envelope.data, &keys))
}

/// Weighted-sum heuristic predicting whether structural compression will
/// pay off: `0.5*keyRepeat + 0.25*scalarRepeat + 0.25*homogeneousLists`.
pub fn estimate_compressibility(value: &Value) -> f64 {
    let mut key_counter: HashMap<String, usize> = HashMap::new();
    let mut scalar_counter: HashMap<String, usize> = HashMap::new();
    let mut homogeneous_lists = 0usize;
    let mut total_lists = 0usize;

    fn walk(
        node: &Value,
        key_counter: &mut HashMap<String, usize>,
        scalar_counter: &mut HashMap<String, usize>,
        homogeneous_lists: &mut usize,
        total_lists: &mut usize,
    ) {
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    *key_counter.entry(key.clone()).or_insert(0) += 1;
                    walk(child, key_counter, scalar_counter, homogeneous_lists, total_lists);
                }
            }
            Value::Array(items) => {
                *total_lists += 1;
                if !items.is_empty() && items.iter().all(|i| i.is_object()) {
                    let mut keysets: Vec<Vec<&str>> = items
                        .iter()
                        .map(|i| {
                            let mut ks: Vec<&str> =
                                i.as_object().unwrap().keys().map(|k| k.as_str()).collect();
                            ks.sort_unstable();
                            ks
                        })
                        .collect();
                    keysets.sort();
                    keysets.dedup();
                    if keysets.len() == 1 {
                        *homogeneous_lists += 1;
                    }
                }
                for item in items {
                    walk(item, key_counter, scalar_counter, homogeneous_lists, total_lists);
                }
            }
            other => {
                let marker = serde_json::to_string(other).unwrap_or_default();
                *scalar_counter.entry(marker).or_insert(0) += 1;
            }
        }
    }
    walk(value, &mut key_counter, &mut scalar_counter, &mut homogeneous_lists, &mut total_lists);

    let total_keys: usize = key_counter.values().sum();
    let duplicate_keys = total_keys.saturating_sub(key_counter.len());
    let key_repeat_ratio = if total_keys > 0 { duplicate_keys as f64 / total_keys as f64 } else { 0.0 };

    let total_scalars: usize = scalar_counter.values().sum();
    let duplicate_scalars = total_scalars.saturating_sub(scalar_counter.len());
    let scalar_repeat_ratio = if total_scalars > 0 { duplicate_scalars as f64 / total_scalars as f64 } else { 0.0 };

    let homogeneous_ratio = if total_lists > 0 { homogeneous_lists as f64 / total_lists as f64 } else { 0.0 };

    (0.5 * key_repeat_ratio + 0.25 * scalar_repeat_ratio + 0.25 * homogeneous_ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rows(n: usize) -> Value {
        let rows: Vec<Value> = (0..n)
            .map(|i| json!({"identifier": i, "status_value": "open", "descriptive_label": "x"}))
            .collect();
        json!({"items": rows})
    }

    #[test]
    fn passthrough_below_min_payload() {
        let input = json!({"a": 1});
        let opts = CompressionOptions { min_payload_bytes: 10_000, ..Default::default() };
        let envelope = compress_result(&input, &opts);
        assert!(!envelope.compressed);
        assert_eq!(envelope.data, input);
    }

    #[test]
    fn round_trip_identity_for_arbitrary_json() {
        let input = sample_rows(20);
        let opts = CompressionOptions { min_payload_bytes: 1, ..Default::default() };
        let envelope = compress_result(&input, &opts);
        let restored = decompress_result(&envelope, |_| None).unwrap();
        assert!(crate::canonical::canonically_equal(&restored, &input));
    }

    #[test]
    fn round_trip_identity_when_not_compressed() {
        let input = json!({"a": 1});
        let envelope = compress_result(&input, &CompressionOptions { min_payload_bytes: 10_000, ..Default::default() });
        let restored = decompress_result(&envelope, |_| None).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn columnar_transform_applies_above_threshold() {
        let input = sample_rows(10);
        let opts = CompressionOptions { min_payload_bytes: 1, ..Default::default() };
        let envelope = compress_result(&input, &opts);
        assert!(envelope.compressed);
        let encoded_items = envelope.data.get("items").or_else(|| {
            // key may have been aliased
            envelope.data.as_object().unwrap().values().next()
        });
        let has_columnar = encoded_items
            .and_then(|v| v.get("~t"))
            .is_some();
        assert!(has_columnar, "expected columnar transform for homogeneous rows");
    }

    #[test]
    fn key_ref_is_stable_and_content_addressed() {
        let mut a = HashMap::new();
        a.insert("k0".to_string(), "identifier".to_string());
        let mut b = HashMap::new();
        b.insert("k0".to_string(), "identifier".to_string());
        assert_eq!(key_ref(&a), key_ref(&b));
        assert!(key_ref(&a).starts_with("kdict-"));
    }

    #[test]
    fn estimate_compressibility_scores_repetitive_payload_higher() {
        let repetitive = sample_rows(20);
        let unique = json!({"a": 1, "b": "x", "c": [1, 2, 3]});
        assert!(estimate_compressibility(&repetitive) > estimate_compressibility(&unique));
    }

    #[test]
    fn decompress_rejects_missing_keys_ref() {
        let envelope = ResultEnvelope {
            encoding: RESULT_ENCODING.to_string(),
            compressed: true,
            mode: CompressionMode::Balanced,
            original_bytes: 10,
            compressed_bytes: 5,
            saved_bytes: 5,
            saved_ratio: 0.5,
            data: json!({"k0": 1}),
            keys: HashMap::new(),
            keys_ref: Some("kdict-missing".to_string()),
        };
        assert!(decompress_result(&envelope, |_| None).is_err());
    }
}
