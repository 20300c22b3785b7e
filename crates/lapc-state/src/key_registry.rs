//! Process-wide key-alias registry: maps a content-hashed registry
//! reference to its alias table, and counts usage so the wire dictionary
//! can be periodically re-sent for clients that lost state.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct KeyRegistry {
    tables: HashMap<String, HashMap<String, String>>,
    usage: HashMap<String, u64>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self { tables: HashMap::new(), usage: HashMap::new() }
    }

    pub fn lookup(&self, reference: &str) -> Option<HashMap<String, String>> {
        self.tables.get(reference).cloned()
    }

    /// Register `reference -> table` if not already known, then bump the
    /// usage counter and report whether the table should be re-sent on the
    /// wire this time (first use, or every `bootstrap_interval`th use).
    pub fn touch(
        &mut self,
        reference: &str,
        table: &HashMap<String, String>,
        bootstrap_interval: u64,
    ) -> bool {
        let is_new = !self.tables.contains_key(reference);
        self.tables.entry(reference.to_string()).or_insert_with(|| table.clone());
        let count = self.usage.entry(reference.to_string()).or_insert(0);
        *count += 1;
        is_new || (bootstrap_interval > 0 && *count % bootstrap_interval == 0)
    }
}
