//! Structural JSON delta encoding (`lapc-delta-v1`).
//!
//! Produces a list of `set`/`delete` operations between two canonicalized
//! JSON values. Deliberately does not attempt a longest-common-subsequence
//! rewrite of arrays of differing length: a length mismatch is always
//! encoded as a single `set` of the whole array at that path, trading patch
//! size for apply-side simplicity and correctness.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{canonical_text, canonicalize};
use crate::error::{ProxyError, Result};

/// One path segment: either a map key or a non-negative array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A single structural operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DeltaOp {
    Set {
        path: Vec<PathSegment>,
        value: Value,
    },
    Delete {
        path: Vec<PathSegment>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaEnvelope {
    pub encoding: String,
    pub baseline_hash: String,
    pub current_hash: String,
    pub ops: Vec<DeltaOp>,
    pub patch_bytes: usize,
    pub full_bytes: usize,
    pub saved_bytes: i64,
    pub saved_ratio: f64,
}

pub const DELTA_ENCODING: &str = "lapc-delta-v1";

fn stable_hash_hex(value: &Value) -> String {
    crate::canonical::stable_hash_hex(value)
}

/// Diff two canonicalized values, accumulating ops under `path`.
fn diff_into(path: &[PathSegment], prev: &Value, curr: &Value, ops: &mut Vec<DeltaOp>) {
    if canonical_text(prev) == canonical_text(curr) {
        return;
    }
    match (prev, curr) {
        (Value::Array(p), Value::Array(c)) if p.len() == c.len() => {
            for (idx, (pv, cv)) in p.iter().zip(c.iter()).enumerate() {
                let mut child = path.to_vec();
                child.push(PathSegment::Index(idx));
                diff_into(&child, pv, cv, ops);
            }
        }
        (Value::Object(p), Value::Object(c)) => {
            let mut keys: Vec<&String> = p.keys().chain(c.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                match (p.get(key), c.get(key)) {
                    (Some(_), None) => {
                        let mut child = path.to_vec();
                        child.push(PathSegment::Key(key.clone()));
                        ops.push(DeltaOp::Delete { path: child });
                    }
                    (None, Some(cv)) => {
                        let mut child = path.to_vec();
                        child.push(PathSegment::Key(key.clone()));
                        ops.push(DeltaOp::Set {
                            path: child,
                            value: cv.clone(),
                        });
                    }
                    (Some(pv), Some(cv)) => {
                        let mut child = path.to_vec();
                        child.push(PathSegment::Key(key.clone()));
                        diff_into(&child, pv, cv, ops);
                    }
                    (None, None) => unreachable!(),
                }
            }
        }
        _ => {
            ops.push(DeltaOp::Set {
                path: path.to_vec(),
                value: curr.clone(),
            });
        }
    }
}

/// Build the op list between two values (canonicalizing both first).
pub fn diff(previous: &Value, current: &Value) -> Vec<DeltaOp> {
    let p = canonicalize(previous);
    let c = canonicalize(current);
    let mut ops = Vec::new();
    diff_into(&[], &p, &c, &mut ops);
    ops
}

/// Build a delta envelope if all emission-gate conditions hold, else `None`.
///
/// Gate: `ops` non-empty, `patchBytes <= max_patch_bytes`, and
/// `(fullBytes - patchBytes) / fullBytes >= min_savings_ratio`.
pub fn create_delta(
    previous: &Value,
    current: &Value,
    min_savings_ratio: f64,
    max_patch_bytes: usize,
) -> Option<DeltaEnvelope> {
    let ops = diff(previous, current);
    if ops.is_empty() {
        return None;
    }

    let patch_json = serde_json::to_value(&ops).ok()?;
    let patch_bytes = serde_json::to_string(&patch_json).ok()?.len();
    let full_text = canonical_text(current);
    let full_bytes = full_text.len();

    if patch_bytes > max_patch_bytes {
        return None;
    }

    let saved_bytes = full_bytes as i64 - patch_bytes as i64;
    let saved_ratio = if full_bytes > 0 {
        saved_bytes as f64 / full_bytes as f64
    } else {
        0.0
    };
    if saved_ratio < min_savings_ratio {
        return None;
    }

    Some(DeltaEnvelope {
        encoding: DELTA_ENCODING.to_string(),
        baseline_hash: stable_hash_hex(previous),
        current_hash: stable_hash_hex(current),
        ops,
        patch_bytes,
        full_bytes,
        saved_bytes,
        saved_ratio,
    })
}

fn navigate_set(target: &mut Value, path: &[PathSegment], value: Value) {
    if path.is_empty() {
        *target = value;
        return;
    }
    let (head, rest) = (&path[0], &path[1..]);
    match head {
        PathSegment::Key(key) => {
            if !target.is_object() {
                *target = Value::Object(serde_json::Map::new());
            }
            let map = target.as_object_mut().unwrap();
            let entry = map.entry(key.clone()).or_insert(Value::Null);
            navigate_set(entry, rest, value);
        }
        PathSegment::Index(idx) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            let arr = target.as_array_mut().unwrap();
            while arr.len() <= *idx {
                arr.push(Value::Null);
            }
            navigate_set(&mut arr[*idx], rest, value);
        }
    }
}

fn navigate_delete(target: &mut Value, path: &[PathSegment]) {
    if path.is_empty() {
        return;
    }
    if path.len() == 1 {
        match &path[0] {
            PathSegment::Key(key) => {
                if let Some(map) = target.as_object_mut() {
                    map.remove(key);
                }
            }
            PathSegment::Index(idx) => {
                if let Some(arr) = target.as_array_mut()
                    && *idx < arr.len()
                {
                    arr.remove(*idx);
                }
            }
        }
        return;
    }
    let (head, rest) = (&path[0], &path[1..]);
    match head {
        PathSegment::Key(key) => {
            if let Some(map) = target.as_object_mut()
                && let Some(child) = map.get_mut(key)
            {
                navigate_delete(child, rest);
            }
        }
        PathSegment::Index(idx) => {
            if let Some(arr) = target.as_array_mut()
                && let Some(child) = arr.get_mut(*idx)
            {
                navigate_delete(child, rest);
            }
        }
    }
}

/// Apply a delta envelope's ops to `previous`, producing `current`.
pub fn apply_delta(previous: &Value, envelope: &DeltaEnvelope) -> Result<Value> {
    if envelope.encoding != DELTA_ENCODING {
        return Err(ProxyError::UpstreamProtocol(format!(
            "unsupported delta encoding: {}",
            envelope.encoding
        )));
    }
    let mut output = canonicalize(previous);
    for op in &envelope.ops {
        match op {
            DeltaOp::Set { path, value } => navigate_set(&mut output, path, value.clone()),
            DeltaOp::Delete { path } => navigate_delete(&mut output, path),
        }
    }
    Ok(output)
}
