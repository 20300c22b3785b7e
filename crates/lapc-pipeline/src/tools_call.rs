//! `tools/call` client intercept and upstream-response post-processing.

use lapc_core::compression::{self, CompressionOptions};
use lapc_core::config::ProxyConfig;
use lapc_core::mutating::is_mutating_tool_name;
use lapc_core::stats::Stats;
use lapc_core::tokens::TokenCounter;
use lapc_state::history::History;
use lapc_state::{make_cache_key, session_server_prefix, synthetic_history_key, FeatureHealth, Outcome, State};
use serde_json::Value;

use crate::delta_step::apply_delta_step;
use crate::search;

/// What the client-side intercept decided to do with a `tools/call`
/// request, before it would otherwise be forwarded upstream.
pub enum ClientDecision {
    /// Answered locally (search meta-tool or cache hit); do not forward.
    Local(Value),
    /// Forward upstream, optionally carrying the cache key to use once the
    /// response arrives.
    Forward { cache_key: Option<String> },
}

/// True if `tool_name` is eligible for caching under `config` (§4.8).
pub fn tool_cache_allowed(tool_name: &str, config: &ProxyConfig) -> bool {
    if tool_name.is_empty() || !config.caching_enabled {
        return false;
    }
    if !config.feature_enabled_for_tool(tool_name, "caching", true) {
        return false;
    }
    config.cache_mutating_tools || !is_mutating_tool_name(tool_name)
}

/// Client-side intercept for a `tools/call` request, before forwarding.
pub fn intercept_tools_call(
    tool_name: &str,
    arguments: &Value,
    config: &ProxyConfig,
    state: &mut State,
    tokens: &dyn TokenCounter,
    stats: &Stats,
) -> ClientDecision {
    if config.lazy_loading_enabled && tool_name == lapc_core::SEARCH_TOOL_NAME {
        let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let server = arguments
            .get("server")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| config.server_name.clone());
        let top_k = arguments.get("top_k").and_then(|v| v.as_u64()).map(|v| v as usize).unwrap_or(config.lazy_top_k);
        let include_schemas = arguments.get("include_schemas").and_then(|v| v.as_bool()).unwrap_or(false);
        let result = search::build_search_result(
            &server,
            query,
            state.tool_index.tools(),
            top_k,
            include_schemas,
            config.lazy_min_confidence_score,
            config.lazy_fallback_full_on_low_confidence,
        );
        let wrapped = serde_json::json!({"structuredContent": result});
        return ClientDecision::Local(wrapped);
    }

    if tool_cache_allowed(tool_name, config) {
        let cache_key = make_cache_key(&config.session_id, &config.server_name, tool_name, arguments);
        if let Some(cached) = state.cache.get(&cache_key) {
            let delivered =
                apply_delta_step(state, config, tool_name, &cache_key, &cached, tokens, stats);
            return ClientDecision::Local(delivered);
        }
        return ClientDecision::Forward { cache_key: Some(cache_key) };
    }

    ClientDecision::Forward { cache_key: None }
}

fn compressible_text_items(result: &Value) -> Vec<usize> {
    let Some(items) = result.get("content").and_then(|v| v.as_array()) else { return Vec::new() };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let text = item.get("text").and_then(|v| v.as_str())?;
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str::<Value>(text).ok()?;
                Some(idx)
            } else {
                None
            }
        })
        .collect()
}

/// Apply the cross-call shared key-alias registry (§4.3) to a compressed
/// envelope: register its alias table under a content-hashed reference, and
/// when the reference has already been sent (and isn't at its periodic
/// rebootstrap boundary), strip `keys` from the wire and leave only
/// `keysRef` for the decoder to resolve from its own registry.
fn apply_key_registry(envelope: &mut compression::ResultEnvelope, config: &ProxyConfig, state: &mut State) {
    if !config.result_shared_key_registry || envelope.keys.is_empty() {
        return;
    }
    let reference = compression::key_ref(&envelope.keys);
    let should_send = state.key_registry.touch(&reference, &envelope.keys, config.result_key_bootstrap_interval);
    envelope.keys_ref = Some(reference);
    if !should_send {
        envelope.keys = std::collections::HashMap::new();
    }
    envelope.compressed_bytes = serde_json::to_string(envelope).map(|s| s.len()).unwrap_or(envelope.compressed_bytes);
    envelope.saved_bytes = envelope.original_bytes as i64 - envelope.compressed_bytes as i64;
    envelope.saved_ratio = if envelope.original_bytes > 0 {
        envelope.saved_bytes as f64 / envelope.original_bytes as f64
    } else {
        0.0
    };
}

/// Attempt result compression on a `tools/call` result (§4.8 step 2).
/// Returns the (possibly rewritten) result, the feature-health outcome,
/// and the byte savings recorded (0 when not applied).
fn apply_result_compression(
    result: &mut Value,
    config: &ProxyConfig,
    state: &mut State,
    tokens: &dyn TokenCounter,
) -> (Outcome, i64) {
    if !config.result_compression_enabled || config.result_compression_mode == compression::CompressionMode::Off {
        return (Outcome::Neutral, 0);
    }

    let original_tokens = tokens.count(result);
    let min_abs = config.result_min_token_savings_abs;
    let min_ratio_tokens = (config.result_min_token_savings_ratio * original_tokens as f64) as i64;
    let required_savings = min_abs.max(min_ratio_tokens);

    let opts = CompressionOptions {
        mode: config.result_compression_mode,
        strip_nulls: config.result_strip_nulls,
        strip_defaults: config.result_strip_defaults,
        min_payload_bytes: config.result_min_payload_bytes,
        ..Default::default()
    };

    let structured = result.get("structuredContent").filter(|v| !v.is_null()).cloned();
    if let Some(structured) = structured {
        let score = compression::estimate_compressibility(&structured);
        if score < config.result_min_compressibility {
            return (Outcome::Neutral, 0);
        }
        let mut envelope = compression::compress_result(&structured, &opts);
        if !envelope.compressed {
            return (Outcome::Neutral, 0);
        }
        apply_key_registry(&mut envelope, config, state);
        let compressed_tokens = tokens.count(&serde_json::to_value(&envelope).unwrap_or(Value::Null));
        let saved_tokens = original_tokens as i64 - compressed_tokens as i64;
        if saved_tokens < required_savings {
            let outcome = if saved_tokens < 0 { Outcome::Hurt } else { Outcome::Neutral };
            return (outcome, 0);
        }

        let envelope_value = serde_json::to_value(&envelope).unwrap_or(Value::Null);
        let original_text = serde_json::to_string(&structured).unwrap_or_default();
        result["structuredContent"] = envelope_value;
        result[lapc_core::EXT_ANNOTATION_KEY] = serde_json::json!({
            "result_compression": {
                "saved_bytes": envelope.saved_bytes,
                "saved_ratio": envelope.saved_ratio,
                "saved_tokens": saved_tokens,
            }
        });

        if config.result_minify_redundant_text
            && let Some(content) = result.get_mut("content")
            && let Some(items) = content.as_array_mut()
        {
            let mut kept_placeholder = false;
            items.retain(|item| {
                let is_dup = item.get("text").and_then(|v| v.as_str()) == Some(original_text.as_str());
                if is_dup {
                    if kept_placeholder {
                        return false;
                    }
                    kept_placeholder = true;
                }
                true
            });
        }

        return (Outcome::Success, envelope.saved_bytes);
    }

    let text_indices = compressible_text_items(result);
    if text_indices.is_empty() {
        return (Outcome::Neutral, 0);
    }
    let mut total_saved_bytes = 0i64;
    let mut total_saved_tokens = 0i64;
    let mut any_compressed = false;
    let mut any_hurt = false;
    if let Some(items) = result.get_mut("content").and_then(|v| v.as_array_mut()) {
        for idx in text_indices {
            let Some(text) = items[idx].get("text").and_then(|v| v.as_str()).map(str::to_string) else { continue };
            let Ok(parsed) = serde_json::from_str::<Value>(&text) else { continue };
            if compression::estimate_compressibility(&parsed) < config.result_min_compressibility {
                continue;
            }
            let mut envelope = compression::compress_result(&parsed, &opts);
            if !envelope.compressed {
                continue;
            }
            apply_key_registry(&mut envelope, config, state);
            let item_original_tokens = tokens.count(&parsed);
            let item_compressed_tokens = tokens.count(&serde_json::to_value(&envelope).unwrap_or(Value::Null));
            let item_saved_tokens = item_original_tokens as i64 - item_compressed_tokens as i64;
            let item_required = min_abs.max((config.result_min_token_savings_ratio * item_original_tokens as f64) as i64);
            if item_saved_tokens < item_required {
                if item_saved_tokens < 0 {
                    any_hurt = true;
                }
                continue;
            }
            let new_text = serde_json::to_string(&envelope).unwrap_or_default();
            total_saved_bytes += text.len() as i64 - new_text.len() as i64;
            total_saved_tokens += item_saved_tokens;
            items[idx]["text"] = Value::String(new_text);
            any_compressed = true;
        }
    }
    if !any_compressed {
        return (if any_hurt { Outcome::Hurt } else { Outcome::Neutral }, 0);
    }
    result[lapc_core::EXT_ANNOTATION_KEY] = serde_json::json!({
        "result_compression": {
            "saved_bytes": total_saved_bytes,
            "saved_tokens": total_saved_tokens,
        }
    });
    (Outcome::Success, total_saved_bytes)
}

/// Compute the adaptive-TTL cache duration, per §4.8 step 4.
fn adaptive_ttl(
    config: &ProxyConfig,
    tool_name: &str,
    state: &mut State,
    cache_key: &str,
    raw_upstream_result: &Value,
) -> std::time::Duration {
    let base_ttl = config.ttl_override_for_tool(tool_name, "caching").unwrap_or(config.cache_ttl_seconds);
    if !config.cache_adaptive_ttl || base_ttl == 0 {
        return std::time::Duration::from_secs(base_ttl);
    }

    let raw_key = History::raw_key(cache_key);
    let previous_raw = state.history.get(&raw_key);
    let ttl_secs = match previous_raw {
        Some(prev) if !lapc_core::canonical::canonically_equal(&prev, raw_upstream_result) => {
            (base_ttl / 2).max(config.cache_ttl_min_seconds)
        }
        Some(_) => ((base_ttl * 3) / 2).min(config.cache_ttl_max_seconds),
        None => base_ttl,
    }
    .clamp(config.cache_ttl_min_seconds, config.cache_ttl_max_seconds);

    state.history.set(&raw_key, raw_upstream_result, state.max_cache_entries);
    std::time::Duration::from_secs(ttl_secs)
}

/// Post-process an upstream `tools/call` response (§4.8 steps 1-6).
/// `result` is mutated in place to become the value delivered to the
/// client. Returns the byte savings attributed to result compression, for
/// stats wiring.
pub fn handle_tools_call_response(
    result: &mut Value,
    tool_name: &str,
    arguments: &Value,
    cache_key: Option<&str>,
    config: &ProxyConfig,
    state: &mut State,
    tokens: &dyn TokenCounter,
    stats: &Stats,
) -> i64 {
    let raw_upstream_result = result.clone();

    let health_key = FeatureHealth::key("result_compression", Some(tool_name));
    let saved_bytes = if state.feature_health.should_skip(&health_key) {
        0
    } else {
        let (outcome, saved) = apply_result_compression(result, config, state, tokens);
        state.feature_health.record(&health_key, outcome);
        saved
    };

    let is_mutating = is_mutating_tool_name(tool_name);
    if config.caching_enabled && !config.cache_mutating_tools && is_mutating {
        let prefix = session_server_prefix(&config.session_id, &config.server_name);
        state.cache.invalidate_prefix(&prefix);
        state.history.invalidate_prefix(&format!("cache_raw:{prefix}"));
    }

    if let Some(cache_key) = cache_key {
        let ttl = adaptive_ttl(config, tool_name, state, cache_key, &raw_upstream_result);
        state.cache_set(cache_key, result, ttl);
    }

    let history_key = cache_key
        .map(str::to_string)
        .unwrap_or_else(|| synthetic_history_key(&config.session_id, &config.server_name, tool_name, arguments));
    let delivered = apply_delta_step(state, config, tool_name, &history_key, result, tokens, stats);
    *result = delivered;

    saved_bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapc_core::tokens::DefaultTokenCounter;
    use serde_json::json;

    #[test]
    fn mutating_tools_are_never_cacheable_by_default() {
        let config = ProxyConfig { caching_enabled: true, ..Default::default() };
        assert!(!tool_cache_allowed("create_issue", &config));
        assert!(tool_cache_allowed("list_items", &config));
    }

    #[test]
    fn per_tool_override_can_disable_caching() {
        let mut config = ProxyConfig { caching_enabled: true, ..Default::default() };
        config.tool_overrides.insert(
            "list_items".to_string(),
            std::collections::HashMap::from([(
                "caching".to_string(),
                lapc_core::config::ToolOverrideValue::Enabled(false),
            )]),
        );
        assert!(!tool_cache_allowed("list_items", &config));
    }

    #[test]
    fn cache_hit_short_circuits_without_forwarding() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { caching_enabled: true, cache_ttl_seconds: 60, ..Default::default() };
        let tokens = DefaultTokenCounter::default();
        let stats = Stats::new();
        let args = json!({"page": 1});

        match intercept_tools_call("list_items", &args, &config, &mut state, &tokens, &stats) {
            ClientDecision::Forward { cache_key } => {
                let key = cache_key.unwrap();
                let mut result = json!({"structuredContent": {"items": ["a"]}});
                handle_tools_call_response(&mut result, "list_items", &args, Some(&key), &config, &mut state, &tokens, &stats);
            }
            ClientDecision::Local(_) => panic!("expected a miss on first call"),
        }

        match intercept_tools_call("list_items", &args, &config, &mut state, &tokens, &stats) {
            ClientDecision::Local(result) => {
                assert_eq!(result["structuredContent"]["items"], json!(["a"]));
            }
            ClientDecision::Forward { .. } => panic!("expected a cache hit on second call"),
        }
    }

    #[test]
    fn mutating_call_invalidates_prior_cache_entries() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { caching_enabled: true, cache_ttl_seconds: 60, ..Default::default() };
        let tokens = DefaultTokenCounter::default();
        let stats = Stats::new();
        let args = json!({"page": 1});
        let key = make_cache_key(&config.session_id, &config.server_name, "list_items", &args);
        state.cache_set(&key, &json!({"structuredContent": {"items": ["a"]}}), std::time::Duration::from_secs(60));

        let mut mutate_result = json!({"structuredContent": {"ok": true}});
        handle_tools_call_response(
            &mut mutate_result,
            "create_issue",
            &json!({}),
            None,
            &config,
            &mut state,
            &tokens,
            &stats,
        );

        assert!(state.cache.get(&key).is_none());
    }

    fn repetitive_rows(n: usize) -> Value {
        let rows: Vec<Value> = (0..n)
            .map(|i| json!({"identifier_value": i, "status_value": "open", "descriptive_label_text": "a fairly long repeated label"}))
            .collect();
        json!({"items": rows})
    }

    #[test]
    fn shared_key_registry_omits_keys_on_repeat_then_resends_at_bootstrap_interval() {
        let mut state = State::new(100, 3, 20);
        let config = ProxyConfig { result_shared_key_registry: true, result_key_bootstrap_interval: 3, ..Default::default() };
        let opts = CompressionOptions { min_payload_bytes: 1, ..Default::default() };
        let payload = repetitive_rows(10);

        let mut first = compression::compress_result(&payload, &opts);
        assert!(first.compressed);
        apply_key_registry(&mut first, &config, &mut state);
        assert!(!first.keys.is_empty(), "first use must send the full dictionary");
        let reference = first.keys_ref.clone().expect("registry reference recorded");

        let mut second = compression::compress_result(&payload, &opts);
        apply_key_registry(&mut second, &config, &mut state);
        assert!(second.keys.is_empty(), "repeat use should omit keys and rely on keysRef");
        assert_eq!(second.keys_ref.as_deref(), Some(reference.as_str()));

        let mut third = compression::compress_result(&payload, &opts);
        apply_key_registry(&mut third, &config, &mut state);
        assert!(!third.keys.is_empty(), "third use lands on the bootstrap_interval=3 boundary and must resend");

        // The decoder reconstructs an omitted dictionary from the registry.
        let restored = compression::decompress_result(&second, |r| state.key_registry.lookup(r)).unwrap();
        assert!(lapc_core::canonical::canonically_equal(&restored, &payload));
    }

    #[test]
    fn search_meta_tool_answers_locally() {
        let mut state = State::new(100, 3, 20);
        state.tool_index.set(&[json!({"name": "tool_7", "description": "d", "inputSchema": {"type": "object"}})]);
        let config = ProxyConfig { lazy_loading_enabled: true, ..Default::default() };
        let tokens = DefaultTokenCounter::default();
        let stats = Stats::new();
        let args = json!({"query": "tool_7"});
        match intercept_tools_call(lapc_core::SEARCH_TOOL_NAME, &args, &config, &mut state, &tokens, &stats) {
            ClientDecision::Local(result) => {
                assert_eq!(result["structuredContent"]["matches"][0]["name"], "tool_7");
            }
            ClientDecision::Forward { .. } => panic!("search tool must never forward upstream"),
        }
    }
}
