//! Per-frame dispatch logic for both pump directions: classifying a client
//! request (local answer vs. forward-and-track), and post-processing an
//! upstream response against the pending table.

use std::sync::atomic::Ordering;

use lapc_core::canonical::canonicalize;
use lapc_core::{tools_hash, RequestId, EXT_ANNOTATION_KEY};
use lapc_pipeline::{initialize, tools_call, tools_list};
use lapc_state::{PendingKind, PendingRequest};
use serde_json::Value;

use crate::context::PumpContext;
use crate::metrics_annotation::annotate_response;

/// What the client writer should forward upstream.
pub struct ForwardInfo {
    pub line: String,
    pub tokens: usize,
    pub bytes: usize,
}

/// What Pump-In does with one client frame.
pub enum ClientOutcome {
    /// Answered locally; the JSON-RPC response line to write to the client.
    Answered(String),
    /// Forward the original line upstream unchanged.
    Forward(ForwardInfo),
    /// Malformed or not a JSON-RPC object; already logged, nothing to do.
    Drop,
}

fn build_response_line(id: &Value, result: &Value) -> String {
    let response = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
    serde_json::to_string(&response).unwrap_or_default()
}

/// Classify and (when not answered locally) prepare the forward of one
/// client-side frame.
pub async fn handle_client_line(ctx: &PumpContext, line: &str) -> ClientOutcome {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed client frame");
            return ClientOutcome::Drop;
        }
    };
    let Some(obj) = value.as_object() else {
        tracing::warn!("skipping non-object client frame");
        return ClientOutcome::Drop;
    };

    let forward_info = || ForwardInfo {
        line: line.to_string(),
        tokens: ctx.tokens.count(&value),
        bytes: line.len(),
    };

    let Some(id_value) = obj.get("id").filter(|v| !v.is_null()) else {
        // Notification: nothing to intercept or track, just forward.
        return ClientOutcome::Forward(forward_info());
    };
    let Ok(id) = serde_json::from_value::<RequestId>(id_value.clone()) else {
        return ClientOutcome::Forward(forward_info());
    };
    let id_for_table = id.clone();
    let method = obj.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let params = obj.get("params").cloned().unwrap_or(Value::Null);

    match method.as_str() {
        "initialize" => {
            let supports = initialize::client_supports_tools_hash_sync(&params);
            let mut pending = ctx.pending.lock().await;
            pending.insert(
                id_for_table,
                PendingRequest { method, kind: PendingKind::Initialize { client_supports_tools_hash_sync: supports } },
            );
            ClientOutcome::Forward(forward_info())
        }
        "tools/list" => {
            let hint = params
                .pointer(&format!("/{EXT_ANNOTATION_KEY}/tools_hash_sync/if_none_match"))
                .and_then(|v| tools_hash::parse_if_none_match(v, &ctx.config.tools_hash_sync_algorithm));

            if let Some(hint) = &hint {
                let mut state = ctx.state.lock().await;
                if let Some(result) = tools_list::evaluate_conditional_tools_list(hint, &ctx.config, &mut state) {
                    return ClientOutcome::Answered(build_response_line(id_value, &result));
                }
            }

            let mut pending = ctx.pending.lock().await;
            pending.insert(
                id_for_table,
                PendingRequest { method, kind: PendingKind::ToolsList { conditional_hash: hint } },
            );
            ClientOutcome::Forward(forward_info())
        }
        "tools/call" => {
            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let arguments = params
                .get("arguments")
                .cloned()
                .filter(Value::is_object)
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

            let decision = {
                let mut state = ctx.state.lock().await;
                tools_call::intercept_tools_call(
                    &tool_name,
                    &arguments,
                    &ctx.config,
                    &mut state,
                    ctx.tokens.as_ref(),
                    &ctx.stats,
                )
            };

            match decision {
                tools_call::ClientDecision::Local(result) => {
                    ctx.stats.record_cache_hit();
                    ClientOutcome::Answered(build_response_line(id_value, &result))
                }
                tools_call::ClientDecision::Forward { cache_key } => {
                    if cache_key.is_some() {
                        ctx.stats.record_cache_miss();
                    }
                    let mut pending = ctx.pending.lock().await;
                    pending.insert(
                        id_for_table,
                        PendingRequest { method, kind: PendingKind::ToolsCall { tool_name, arguments, cache_key } },
                    );
                    ClientOutcome::Forward(forward_info())
                }
            }
        }
        _ => {
            let mut pending = ctx.pending.lock().await;
            pending.insert(id_for_table, PendingRequest { method, kind: PendingKind::Other });
            ClientOutcome::Forward(forward_info())
        }
    }
}

/// Post-process one upstream-side frame and return the line to deliver to
/// the client, if any. Returns `None` only for malformed/non-object input
/// (already logged).
pub async fn handle_upstream_line(ctx: &PumpContext, line: &str) -> Option<String> {
    let mut value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed upstream frame");
            return None;
        }
    };
    if !value.is_object() {
        tracing::warn!("skipping non-object upstream frame");
        return None;
    }

    let id_value = value.get("id").filter(|v| !v.is_null()).cloned();
    let Some(id_value) = id_value else {
        // Server-originated notification; nothing tracked, forward as-is.
        return Some(line.to_string());
    };
    let Ok(id) = serde_json::from_value::<RequestId>(id_value) else {
        return Some(line.to_string());
    };

    let raw_tokens = ctx.tokens.count(&value);
    let raw_bytes = line.len();
    ctx.stats.record_upstream_response(raw_tokens as u64, raw_bytes as u64);

    let pending = {
        let mut table = ctx.pending.lock().await;
        table.take(&id)
    };
    let Some(pending) = pending else {
        tracing::warn!(id = %id, "upstream response for an id with no pending request");
        annotate_response(&mut value, &ctx.stats, ctx.config.stats);
        return Some(serde_json::to_string(&value).unwrap_or_default());
    };

    let is_error = value.get("error").map(|v| !v.is_null()).unwrap_or(false);
    if is_error {
        if matches!(pending.kind, PendingKind::Initialize { .. }) {
            ctx.tools_hash_sync_negotiated.store(false, Ordering::Relaxed);
        }
        annotate_response(&mut value, &ctx.stats, ctx.config.stats);
        return Some(serde_json::to_string(&value).unwrap_or_default());
    }

    let Some(mut result) = value.get("result").cloned() else {
        annotate_response(&mut value, &ctx.stats, ctx.config.stats);
        return Some(serde_json::to_string(&value).unwrap_or_default());
    };

    match pending.kind {
        PendingKind::Initialize { client_supports_tools_hash_sync } => {
            let injected = initialize::inject_server_capability(&mut result, client_supports_tools_hash_sync);
            if injected {
                ctx.tools_hash_sync_negotiated.store(true, Ordering::Relaxed);
            }
        }
        PendingKind::ToolsList { conditional_hash } => {
            let negotiated = ctx.tools_hash_sync_negotiated.load(Ordering::Relaxed);
            let mut state = ctx.state.lock().await;
            let (new_result, saved) = tools_list::handle_tools_list_response(
                &result,
                &ctx.config,
                &mut state,
                ctx.tokens.as_ref(),
                negotiated,
                conditional_hash.as_deref(),
            );
            drop(state);
            ctx.stats.record_tools_list_savings(saved);
            result = new_result;
        }
        PendingKind::ToolsCall { tool_name, arguments, cache_key } => {
            let mut state = ctx.state.lock().await;
            let saved = tools_call::handle_tools_call_response(
                &mut result,
                &tool_name,
                &arguments,
                cache_key.as_deref(),
                &ctx.config,
                &mut state,
                ctx.tokens.as_ref(),
                &ctx.stats,
            );
            drop(state);
            ctx.stats.record_result_compression_savings(saved);
        }
        PendingKind::Other => {}
    }

    value["result"] = result;
    annotate_response(&mut value, &ctx.stats, ctx.config.stats);
    Some(serde_json::to_string(&value).unwrap_or_default())
}

/// Canonicalization entry point kept here for reuse in tests below; the
/// pipeline stages already canonicalize internally where it matters.
#[allow(dead_code)]
fn canonical_debug(value: &Value) -> Value {
    canonicalize(value)
}
