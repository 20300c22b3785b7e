//! `tools/list` response post-processing: definition compression, lazy
//! visibility rewriting, search meta-tool injection, and tools-hash-sync.

use lapc_core::config::{LazyMode, ProxyConfig};
use lapc_core::tokens::TokenCounter;
use lapc_core::{descriptions, schema, tools_hash, SEARCH_TOOL_NAME};
use lapc_state::tools_hash_table::ToolsHashTable;
use lapc_state::State;
use serde_json::Value;

const SEARCH_TOOL_BASE_DESCRIPTION: &str =
    "Search the full tool catalog by keyword and get back ranked matches.";

/// Outcome of tools-hash-sync conditional evaluation, exposed for tests and
/// stats wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    /// Short-circuited locally without contacting upstream.
    LocalNotModified,
    /// Forwarded upstream; the new hash matched the hint.
    UpstreamNotModified,
    /// Forwarded upstream; forced refresh boundary hit.
    ForcedRefresh,
    /// Forwarded upstream; hash differs (miss).
    Miss,
    /// Tools-hash-sync not active for this call.
    Inactive,
}

/// Definition compression (§4.6): shorten the tool's own description and
/// recursively shorten `description` fields inside its input schema,
/// leaving every other schema key untouched. Distinct from `minimal_stub`'s
/// use of `schema::strip_schema_metadata`, which prunes schema keys down to
/// a semantically-significant subset and is reserved for lazy stubs.
fn compress_tool(tool: &Value) -> Value {
    let mut out = tool.clone();
    if let Some(desc) = out.get("description").and_then(|v| v.as_str()) {
        let compressed = descriptions::compress_description(desc);
        out["description"] = Value::String(compressed);
    }
    if let Some(input_schema) = out.get_mut("inputSchema") {
        descriptions::compress_schema(input_schema);
    }
    out
}

fn bare_stub(tool: &Value) -> Value {
    serde_json::json!({
        "name": tool.get("name").cloned().unwrap_or(Value::Null),
        "inputSchema": {"type": "object"},
    })
}

fn minimal_stub(tool: &Value) -> Value {
    let mut out = serde_json::json!({
        "name": tool.get("name").cloned().unwrap_or(Value::Null),
    });
    if let Some(desc) = tool.get("description").and_then(|v| v.as_str()) {
        out["description"] = Value::String(descriptions::compress_description(desc));
    }
    if let Some(input_schema) = tool.get("inputSchema") {
        out["inputSchema"] = schema::strip_schema_metadata(input_schema, 0);
    }
    out
}

fn search_meta_tool(mode: LazyMode, tools: &[Value]) -> Value {
    let description = match mode {
        LazyMode::Catalog => {
            let names: Vec<&str> =
                tools.iter().filter_map(|t| t.get("name").and_then(|v| v.as_str())).collect();
            format!(
                "{SEARCH_TOOL_BASE_DESCRIPTION} Available tools:\n{}",
                names.join("\n")
            )
        }
        _ => SEARCH_TOOL_BASE_DESCRIPTION.to_string(),
    };
    serde_json::json!({
        "name": SEARCH_TOOL_NAME,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "server": {"type": "string"},
                "top_k": {"type": "integer"},
                "include_schemas": {"type": "boolean"},
            },
            "required": ["query"],
        },
    })
}

fn json_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

/// Post-process an upstream `tools/list` result.
///
/// Returns `(new_result, saved_bytes)`; `saved_bytes` is `original - new`
/// size, clamped to values the caller should only record when positive.
#[allow(clippy::too_many_arguments)]
pub fn handle_tools_list_response(
    result: &Value,
    config: &ProxyConfig,
    state: &mut State,
    tokens: &dyn TokenCounter,
    tools_hash_sync_negotiated: bool,
    conditional_hint: Option<&str>,
) -> (Value, i64) {
    let original_size = json_size(result);

    let Some(raw_tools) = result.get("tools").and_then(|v| v.as_array()) else {
        return (result.clone(), 0);
    };

    let compressed_tools: Vec<Value> = if config.definition_compression_enabled {
        raw_tools.iter().map(compress_tool).collect()
    } else {
        raw_tools.clone()
    };
    state.tool_index.set(&compressed_tools);

    let tool_count = compressed_tools.len();
    let tools_value = Value::Array(compressed_tools.clone());
    let lazy_allowed = config.lazy_loading_enabled
        && config.lazy_mode != LazyMode::Off
        && (tool_count >= config.lazy_min_tools || tokens.count(&tools_value) >= config.lazy_min_tokens);

    let mut visible: Vec<Value> = if lazy_allowed {
        match config.lazy_mode {
            LazyMode::SearchOnly => Vec::new(),
            LazyMode::Minimal => compressed_tools.iter().map(minimal_stub).collect(),
            LazyMode::Catalog => compressed_tools.iter().map(bare_stub).collect(),
            LazyMode::Off => compressed_tools.clone(),
        }
    } else {
        compressed_tools.clone()
    };

    if lazy_allowed {
        visible.push(search_meta_tool(config.lazy_mode, &compressed_tools));
    }

    let mut new_result = result.clone();
    new_result["tools"] = Value::Array(visible.clone());

    if tools_hash_sync_negotiated && config.tools_hash_sync_enabled {
        let scope = ToolsHashTable::scope_key(&config.session_id, &config.server_name, "");
        let fingerprint = config.server_name.clone();
        let new_hash = tools_hash::compute_tools_hash(
            &new_result["tools"],
            config.tools_hash_sync_include_server_fingerprint,
            &fingerprint,
        );

        let stored_hash = state.tools_hash.get(&scope).map(|e| e.last_hash.clone());
        let refresh_interval = config.tools_hash_sync_refresh_interval.max(1);

        if let Some(hint) = conditional_hint {
            if stored_hash.as_deref() == Some(hint) {
                let hits = state.tools_hash.increment_hits(&scope);
                if hits % refresh_interval != 0 {
                    new_result["tools"] = Value::Array(Vec::new());
                    new_result[lapc_core::EXT_ANNOTATION_KEY] = serde_json::json!({
                        "tools_hash_sync": {"not_modified": true, "tools_hash": hint}
                    });
                    return (new_result, original_size as i64 - json_size(&new_result) as i64);
                }
                state.tools_hash.reset_hits(&scope);
            }
        }

        state.tools_hash.set_hash(&scope, &new_hash);
        new_result[lapc_core::EXT_ANNOTATION_KEY] = serde_json::json!({
            "tools_hash_sync": {"not_modified": false, "tools_hash": new_hash}
        });
    }

    let new_size = json_size(&new_result);
    (new_result, original_size as i64 - new_size as i64)
}

/// Build the local short-circuit response for a conditional `tools/list`
/// request whose hint matches the stored hash and is not at the forced
/// refresh boundary, avoiding an upstream round-trip entirely.
pub fn local_not_modified_response(hint: &str) -> Value {
    serde_json::json!({
        "tools": [],
        "_ultra_lean_mcp_proxy": {
            "tools_hash_sync": {"not_modified": true, "tools_hash": hint}
        }
    })
}

/// Evaluate whether a `tools/list` request carrying conditional hint `hint`
/// can be answered locally without contacting upstream at all (§4.4 bullet
/// 1). Returns `Some(response)` on a short-circuit hit; `None` means the
/// caller must forward the request and later drive the forwarded-path
/// conditional logic inside [`handle_tools_list_response`] with the same
/// hint as `conditional_hint`.
pub fn evaluate_conditional_tools_list(hint: &str, config: &ProxyConfig, state: &mut State) -> Option<Value> {
    if !config.tools_hash_sync_enabled {
        return None;
    }
    let scope = ToolsHashTable::scope_key(&config.session_id, &config.server_name, "");
    let stored_hash = state.tools_hash.get(&scope).map(|e| e.last_hash.clone())?;
    if stored_hash != hint {
        return None;
    }
    let refresh_interval = config.tools_hash_sync_refresh_interval.max(1);
    let hits = state.tools_hash.get(&scope).map(|e| e.conditional_hits).unwrap_or(0);
    if (hits + 1) % refresh_interval == 0 {
        return None;
    }
    state.tools_hash.increment_hits(&scope);
    Some(local_not_modified_response(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapc_core::tokens::DefaultTokenCounter;
    use serde_json::json;

    fn sample_tools(n: usize) -> Value {
        let tools: Vec<Value> = (0..n)
            .map(|i| {
                json!({
                    "name": format!("tool_{i}"),
                    "description": "This tool allows users to retrieve repository information.",
                    "inputSchema": {"type": "object", "title": "drop me"},
                })
            })
            .collect();
        json!({"tools": tools})
    }

    #[test]
    fn non_list_tools_pass_through_verbatim() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig::default();
        let counter = DefaultTokenCounter::default();
        let result = json!({"tools": "not-a-list"});
        let (out, saved) = handle_tools_list_response(&result, &config, &mut state, &counter, false, None);
        assert_eq!(out, result);
        assert_eq!(saved, 0);
    }

    #[test]
    fn definition_compression_applies_to_each_tool() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { definition_compression_enabled: true, ..Default::default() };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(3);
        let (out, _saved) = handle_tools_list_response(&result, &config, &mut state, &counter, false, None);
        let tools = out["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert!(tools[0]["description"].as_str().unwrap().contains("repo"));
        // definition compression only shortens description text; unrelated
        // schema metadata like `title` survives (pruning is lazy-stub only).
        assert_eq!(tools[0]["inputSchema"]["title"], "drop me");
    }

    #[test]
    fn lazy_search_only_hides_tools_and_injects_meta_tool() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig {
            lazy_loading_enabled: true,
            lazy_mode: LazyMode::SearchOnly,
            lazy_min_tools: 2,
            ..Default::default()
        };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(5);
        let (out, _saved) = handle_tools_list_response(&result, &config, &mut state, &counter, false, None);
        let tools = out["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], SEARCH_TOOL_NAME);
    }

    #[test]
    fn lazy_catalog_mode_has_bare_stubs_with_no_description() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig {
            lazy_loading_enabled: true,
            lazy_mode: LazyMode::Catalog,
            lazy_min_tools: 2,
            ..Default::default()
        };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(5);
        let (out, _saved) = handle_tools_list_response(&result, &config, &mut state, &counter, false, None);
        let tools = out["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6); // 5 stubs + meta tool
        assert!(tools[0].get("description").is_none());
        let meta = tools.iter().find(|t| t["name"] == SEARCH_TOOL_NAME).unwrap();
        assert!(meta["description"].as_str().unwrap().contains("tool_0"));
    }

    #[test]
    fn below_lazy_threshold_keeps_full_visibility() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig {
            lazy_loading_enabled: true,
            lazy_mode: LazyMode::SearchOnly,
            lazy_min_tools: 100,
            lazy_min_tokens: 100_000,
            ..Default::default()
        };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(3);
        let (out, _saved) = handle_tools_list_response(&result, &config, &mut state, &counter, false, None);
        assert_eq!(out["tools"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn tools_hash_sync_annotates_full_snapshot_on_miss() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { tools_hash_sync_enabled: true, ..Default::default() };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(2);
        let (out, _saved) = handle_tools_list_response(&result, &config, &mut state, &counter, true, None);
        assert_eq!(out["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], false);
        assert!(out["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["tools_hash"]
            .as_str()
            .unwrap()
            .starts_with("sha256:"));
    }

    #[test]
    fn tools_hash_sync_returns_not_modified_when_hint_matches() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { tools_hash_sync_enabled: true, ..Default::default() };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(2);
        let (first, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, None);
        let hash = first["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["tools_hash"].as_str().unwrap().to_string();

        let (second, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, Some(&hash));
        assert_eq!(second["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], true);
        assert_eq!(second["tools"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn forced_refresh_interval_returns_full_snapshot_after_n_hits() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig {
            tools_hash_sync_enabled: true,
            tools_hash_sync_refresh_interval: 3,
            ..Default::default()
        };
        let counter = DefaultTokenCounter::default();
        let result = sample_tools(2);
        let (first, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, None);
        let hash = first["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["tools_hash"].as_str().unwrap().to_string();

        let (r2, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, Some(&hash));
        assert_eq!(r2["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], true);
        let (r3, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, Some(&hash));
        assert_eq!(r3["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], true);
        // third conditional hit (hits=3) lands on the forced-refresh boundary
        let (r4, _) = handle_tools_list_response(&result, &config, &mut state, &counter, true, Some(&hash));
        assert_eq!(r4["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], false);
    }
}
