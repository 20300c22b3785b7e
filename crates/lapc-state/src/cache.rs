//! TTL cache keyed by `"{session}:{server}:{tool}:{hash(args)}"`.
//!
//! `get` clones on read and lazily deletes expired entries; `set` clones on
//! write. Neither caller can observe or mutate the other's copy.

use std::time::{Duration, Instant};

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Instant,
    pub created_at: Instant,
    pub hits: u64,
}

#[derive(Debug, Default)]
pub struct Cache {
    entries: std::collections::HashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self { entries: std::collections::HashMap::new() }
    }

    /// Insert a deep clone of `value` under `key` with the given TTL.
    pub fn set(&mut self, key: &str, value: &Value, ttl: Duration, max_entries: usize) {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at: now + ttl,
                created_at: now,
                hits: 0,
            },
        );
        self.evict_excess(max_entries);
    }

    /// Return a deep clone of the cached value, or `None` if missing or
    /// expired (expired entries are removed on access).
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => now > entry.expires_at,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key).expect("checked above");
        entry.hits += 1;
        Some(entry.value.clone())
    }

    /// Remove every key starting with `prefix`.
    pub fn invalidate_prefix(&mut self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort ascending by `(hits, created_at)` and drop the excess from the
    /// front when the table exceeds `max_entries`.
    fn evict_excess(&mut self, max_entries: usize) {
        if self.entries.len() <= max_entries {
            return;
        }
        let mut keys: Vec<(String, u64, Instant)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.hits, v.created_at))
            .collect();
        keys.sort_by(|a, b| (a.1, a.2).cmp(&(b.1, b.2)));
        let excess = self.entries.len() - max_entries;
        for (key, _, _) in keys.into_iter().take(excess) {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_returns_distinct_clone() {
        let mut cache = Cache::new();
        cache.set("k", &json!({"a": 1}), Duration::from_secs(60), 100);
        let mut a = cache.get("k").unwrap();
        a["a"] = json!(999);
        let b = cache.get("k").unwrap();
        assert_eq!(b["a"], json!(1));
    }

    #[test]
    fn get_past_ttl_returns_none_and_deletes() {
        let mut cache = Cache::new();
        cache.set("k", &json!(1), Duration::from_millis(0), 100);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_prefix_removes_matching_keys() {
        let mut cache = Cache::new();
        cache.set("s:srv:tool_a:h1", &json!(1), Duration::from_secs(60), 100);
        cache.set("s:srv:tool_b:h2", &json!(2), Duration::from_secs(60), 100);
        cache.set("other:srv:tool_c:h3", &json!(3), Duration::from_secs(60), 100);
        cache.invalidate_prefix("s:srv:");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("other:srv:tool_c:h3").is_some());
    }

    #[test]
    fn eviction_drops_least_used_oldest_first() {
        let mut cache = Cache::new();
        cache.set("a", &json!(1), Duration::from_secs(60), 2);
        cache.set("b", &json!(2), Duration::from_secs(60), 2);
        // bump "b"'s hit count so "a" is evicted first
        cache.get("b");
        cache.set("c", &json!(3), Duration::from_secs(60), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
