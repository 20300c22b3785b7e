//! Shared state reached by both pump directions.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lapc_core::config::ProxyConfig;
use lapc_core::stats::Stats;
use lapc_core::tokens::TokenCounter;
use lapc_state::{PendingTable, State};
use tokio::sync::Mutex;

/// Everything Pump-In and Pump-Out need beyond their own stdio handles.
/// Each table is reached through its own `tokio::sync::Mutex`, matching
/// §5's "single mutex or per-table mutex" allowance for a multi-threaded
/// runtime; `tools_hash_sync_negotiated` is a lock-free flag since both
/// directions only ever read or flip it, never read-modify-write it under
/// contention with other fields.
pub struct PumpContext {
    pub config: Arc<ProxyConfig>,
    pub state: Mutex<State>,
    pub pending: Mutex<PendingTable>,
    pub stats: Stats,
    pub tokens: Box<dyn TokenCounter>,
    pub tools_hash_sync_negotiated: AtomicBool,
}

impl PumpContext {
    pub fn new(config: Arc<ProxyConfig>, tokens: Box<dyn TokenCounter>) -> Self {
        let state = State::new(
            config.cache_max_entries,
            config.auto_disable_threshold,
            config.auto_disable_cooldown_requests,
        );
        Self {
            config,
            state: Mutex::new(state),
            pending: Mutex::new(PendingTable::new()),
            stats: Stats::new(),
            tokens,
            tools_hash_sync_negotiated: AtomicBool::new(false),
        }
    }
}
