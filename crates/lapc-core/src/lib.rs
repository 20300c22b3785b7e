//! LAPC Core — canonicalization, token counting, delta encoding, result
//! compression, tools-hash-sync, description/schema pruning, configuration,
//! and stats types shared by the rest of the proxy.
//!
//! - [`canonical`]: deterministic JSON ordering and stable SHA-256 hashing.
//! - [`tokens`]: approximate token cost estimation (BPE with heuristic fallback).
//! - [`delta`]: structural `lapc-delta-v1` diff/apply.
//! - [`compression`]: reversible `lapc-json-v1` result envelopes.
//! - [`tools_hash`]: tools-hash-sync wire helpers.
//! - [`descriptions`] / [`schema`]: tool-manifest shrinking rules.
//! - [`mutating`]: mutating-tool-name classification.
//! - [`config`]: the resolved `ProxyConfig` data model.
//! - [`stats`]: running metrics counters.
//! - [`error`]: the `ProxyError` hierarchy.

pub mod canonical;
pub mod compression;
pub mod config;
pub mod delta;
pub mod descriptions;
pub mod error;
pub mod mutating;
pub mod request_id;
pub mod schema;
pub mod stats;
pub mod tokens;
pub mod tools_hash;

pub use error::{ProxyError, Result};
pub use request_id::RequestId;

/// Reserved proxy-local search meta-tool name.
pub const SEARCH_TOOL_NAME: &str = "ultra_lean_mcp_proxy.search_tools";

/// Capabilities/experimental extension key used for tools-hash-sync
/// negotiation (`capabilities.experimental.<EXT_NAME>`).
pub const EXT_NAME: &str = "ultra_lean_mcp_proxy";

/// Params/result annotation key (`_ultra_lean_mcp_proxy`).
pub const EXT_ANNOTATION_KEY: &str = "_ultra_lean_mcp_proxy";
