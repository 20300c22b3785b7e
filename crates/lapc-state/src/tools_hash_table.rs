//! Per-scope tools-hash-sync bookkeeping: `{last_hash, conditional_hits}`.
//!
//! A scope is `(session, server, profile_fingerprint)`, flattened to a
//! single string key since the table never needs to iterate by component.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ToolsHashEntry {
    pub last_hash: String,
    pub conditional_hits: u64,
    pub updated_at: Option<std::time::Instant>,
}

#[derive(Debug, Default)]
pub struct ToolsHashTable {
    entries: HashMap<String, ToolsHashEntry>,
}

impl ToolsHashTable {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn scope_key(session: &str, server: &str, profile_fingerprint: &str) -> String {
        format!("{session}:{server}:{profile_fingerprint}")
    }

    pub fn get(&self, scope: &str) -> Option<&ToolsHashEntry> {
        self.entries.get(scope)
    }

    /// Set `last_hash` for `scope`. Setting a *different* hash than what was
    /// stored resets `conditional_hits` to 0; setting the same hash again
    /// leaves the counter untouched (callers increment it separately).
    pub fn set_hash(&mut self, scope: &str, hash: &str) {
        let entry = self.entries.entry(scope.to_string()).or_default();
        if entry.last_hash != hash {
            entry.last_hash = hash.to_string();
            entry.conditional_hits = 0;
        }
        entry.updated_at = Some(std::time::Instant::now());
    }

    pub fn increment_hits(&mut self, scope: &str) -> u64 {
        let entry = self.entries.entry(scope.to_string()).or_default();
        entry.conditional_hits += 1;
        entry.conditional_hits
    }

    pub fn reset_hits(&mut self, scope: &str) {
        if let Some(entry) = self.entries.get_mut(scope) {
            entry.conditional_hits = 0;
        }
    }
}
