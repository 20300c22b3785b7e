//! Aggregate, lock-guarded state store: cache, history, tools-hash table,
//! tool index, feature health, and key registry behind one
//! `Arc<tokio::sync::Mutex<_>>`-friendly struct per table.
//!
//! Per §5, confinement to the task(s) that own both pump directions is
//! sufficient without locking; this struct is still built around interior
//! tables so a multi-threaded runtime can wrap each in its own mutex if it
//! chooses. `Pump` in `lapc-pump` wraps the whole struct in one
//! `Arc<tokio::sync::Mutex<State>>`, matching the "single mutex or
//! per-table mutex" allowance.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::cache::Cache;
use crate::feature_health::FeatureHealth;
use crate::history::History;
use crate::key_registry::KeyRegistry;
use crate::tool_index::ToolIndex;
use crate::tools_hash_table::ToolsHashTable;

#[derive(Debug)]
pub struct State {
    pub cache: Cache,
    pub history: History,
    pub tools_hash: ToolsHashTable,
    pub tool_index: ToolIndex,
    pub feature_health: FeatureHealth,
    pub key_registry: KeyRegistry,
    /// Consecutive delta emissions per history key, reset on a baseline
    /// refresh (forced snapshot interval or missing previous).
    pub delta_counters: HashMap<String, u64>,
    pub max_cache_entries: usize,
}

impl State {
    pub fn new(max_cache_entries: usize, auto_disable_threshold: u32, auto_disable_cooldown: u32) -> Self {
        Self {
            cache: Cache::new(),
            history: History::new(),
            tools_hash: ToolsHashTable::new(),
            tool_index: ToolIndex::new(),
            feature_health: FeatureHealth::new(auto_disable_threshold, auto_disable_cooldown),
            key_registry: KeyRegistry::new(),
            delta_counters: HashMap::new(),
            max_cache_entries,
        }
    }

    /// Current delta counter for `history_key` (0 if unseen).
    pub fn delta_counter(&self, history_key: &str) -> u64 {
        self.delta_counters.get(history_key).copied().unwrap_or(0)
    }

    pub fn increment_delta_counter(&mut self, history_key: &str) {
        *self.delta_counters.entry(history_key.to_string()).or_insert(0) += 1;
    }

    pub fn reset_delta_counter(&mut self, history_key: &str) {
        self.delta_counters.insert(history_key.to_string(), 0);
    }

    pub fn cache_set(&mut self, key: &str, value: &Value, ttl: Duration) {
        self.cache.set(key, value, ttl, self.max_cache_entries);
    }

    pub fn history_set(&mut self, key: &str, value: &Value) {
        self.history.set(key, value, self.max_cache_entries);
    }
}

/// Compose the composite cache key `"{session}:{server}:{tool}:{hash(args)}"`.
pub fn make_cache_key(session: &str, server: &str, tool: &str, arguments: &Value) -> String {
    let hash = lapc_core::canonical::stable_hash_hex(arguments);
    format!("{session}:{server}:{tool}:{hash}")
}

/// The `"{session}:{server}:"` prefix mutation invalidation targets.
pub fn session_server_prefix(session: &str, server: &str) -> String {
    format!("{session}:{server}:")
}

/// A synthetic history key for non-cacheable tool calls, used so delta
/// diffing still has a baseline target even when caching is disabled.
pub fn synthetic_history_key(session: &str, server: &str, tool: &str, arguments: &Value) -> String {
    format!("noncache:{}", make_cache_key(session, server, tool, arguments))
}
