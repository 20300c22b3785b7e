//! LAPC Pipeline — the request/response handlers that sit between the
//! bidirectional pump and the shared state store: `initialize` capability
//! negotiation, `tools/list` shrinking and tools-hash-sync, the `tools/call`
//! client intercept and upstream-response post-processing, the shared delta
//! step, and the proxy-local search meta-tool.
//!
//! - [`initialize`]: tools-hash-sync capability negotiation.
//! - [`tools_list`]: definition compression, lazy visibility, tools-hash-sync.
//! - [`tools_call`]: cache/compression/mutation-invalidation handling.
//! - [`delta_step`]: the delta-response step shared by both call paths.
//! - [`search`]: the proxy-local search meta-tool ranking.

pub mod delta_step;
pub mod initialize;
pub mod search;
pub mod tools_call;
pub mod tools_list;

pub use delta_step::apply_delta_step;
pub use tools_call::{handle_tools_call_response, intercept_tools_call, tool_cache_allowed, ClientDecision};
pub use tools_list::{handle_tools_list_response, local_not_modified_response};
