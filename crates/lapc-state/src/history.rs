//! Response-history store for delta generation, plus the `cache_raw:`
//! parallel table used to detect whether an upstream result changed
//! between observations (adaptive TTL).

use std::collections::HashMap;

use serde_json::Value;

pub const RAW_UPSTREAM_PREFIX: &str = "cache_raw:";

#[derive(Debug, Default)]
pub struct History {
    // Insertion order tracked separately so overflow drops the oldest entry,
    // since `HashMap` does not preserve insertion order.
    entries: HashMap<String, Value>,
    order: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self { entries: HashMap::new(), order: Vec::new() }
    }

    /// Store a deep clone of `value` under `key`. Soft-bounded to
    /// `2 * max_entries` total entries; overflow drops the oldest insert.
    pub fn set(&mut self, key: &str, value: &Value, max_entries: usize) {
        if !self.entries.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.entries.insert(key.to_string(), value.clone());
        let bound = max_entries.saturating_mul(2).max(1);
        while self.entries.len() > bound {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    pub fn invalidate_prefix(&mut self, prefix: &str) {
        let to_remove: Vec<String> =
            self.order.iter().filter(|k| k.starts_with(prefix)).cloned().collect();
        for key in to_remove {
            self.entries.remove(&key);
            self.order.retain(|k| k != &key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn raw_key(cache_key: &str) -> String {
        format!("{RAW_UPSTREAM_PREFIX}{cache_key}")
    }
}
