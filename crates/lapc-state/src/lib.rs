//! LAPC State — the proxy's in-memory tables: TTL cache, response history,
//! tools-hash-sync scope table, tool index, per-feature health tracking,
//! the cross-call key-alias registry, and the per-request pending table.
//!
//! - [`cache`]: TTL cache with (hits, created_at)-ordered eviction.
//! - [`history`]: delta-diff baselines plus the `cache_raw:` shadow table.
//! - [`tools_hash_table`]: per-scope tools-hash-sync bookkeeping.
//! - [`tool_index`]: last known canonical tool list for the search meta-tool.
//! - [`feature_health`]: per-(feature, tool) regression/cooldown tracking.
//! - [`key_registry`]: cross-call shared key-alias dictionary.
//! - [`pending`]: the per-request pending table shared by the two pumps.
//! - [`state`]: the aggregate `State` struct and cache-key helpers.

pub mod cache;
pub mod feature_health;
pub mod history;
pub mod key_registry;
pub mod pending;
pub mod state;
pub mod tool_index;
pub mod tools_hash_table;

pub use feature_health::{FeatureHealth, Outcome};
pub use pending::{PendingKind, PendingRequest, PendingTable};
pub use state::{make_cache_key, session_server_prefix, synthetic_history_key, State};
