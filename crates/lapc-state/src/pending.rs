//! The per-request pending table: the only correctness-critical structure
//! shared across the two pump tasks.
//!
//! A response id is present in the table iff the corresponding client
//! request was forwarded upstream and has not yet been answered.

use std::collections::HashMap;

use lapc_core::RequestId;
use serde_json::Value;

/// What Pump-Out needs to know to post-process the matching upstream
/// response for a forwarded request.
#[derive(Debug, Clone)]
pub enum PendingKind {
    Initialize {
        client_supports_tools_hash_sync: bool,
    },
    ToolsList {
        conditional_hash: Option<String>,
    },
    ToolsCall {
        tool_name: String,
        arguments: Value,
        cache_key: Option<String>,
    },
    Other,
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: String,
    pub kind: PendingKind,
}

/// Pending table, confined to the single task that owns both pump
/// directions (or guarded by one mutex in a multi-threaded runtime).
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<RequestId, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn insert(&mut self, id: RequestId, request: PendingRequest) {
        self.entries.insert(id, request);
    }

    /// Remove and return the entry for `id`, if any. Matching a response id
    /// to pending state always removes the entry atomically.
    pub fn take(&mut self, id: &RequestId) -> Option<PendingRequest> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_take_removes_entry() {
        let mut table = PendingTable::new();
        let id = RequestId::Number(1);
        table.insert(id.clone(), PendingRequest { method: "tools/call".to_string(), kind: PendingKind::Other });
        assert!(table.contains(&id));
        let entry = table.take(&id).unwrap();
        assert_eq!(entry.method, "tools/call");
        assert!(!table.contains(&id));
    }

    #[test]
    fn take_on_missing_id_returns_none() {
        let mut table = PendingTable::new();
        assert!(table.take(&RequestId::Str("missing".to_string())).is_none());
    }

    #[test]
    fn string_and_number_ids_do_not_collide() {
        let mut table = PendingTable::new();
        table.insert(RequestId::Number(1), PendingRequest { method: "a".to_string(), kind: PendingKind::Other });
        table.insert(RequestId::Str("1".to_string()), PendingRequest { method: "b".to_string(), kind: PendingKind::Other });
        assert_eq!(table.len(), 2);
    }
}
