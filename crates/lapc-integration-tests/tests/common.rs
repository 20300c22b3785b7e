//! Shared scenario-test plumbing: drives `lapc-pump`'s dispatch functions
//! directly against a `PumpContext`, the way the real pump does, with a
//! fake upstream responder closure standing in for the subprocess
//! boundary (§8 "no real child process is spawned in tests").

use std::sync::Arc;

use lapc_core::config::ProxyConfig;
use lapc_core::tokens::DefaultTokenCounter;
use lapc_pump::dispatch::{self, ClientOutcome};
use lapc_pump::PumpContext;
use serde_json::Value;

#[allow(dead_code)]
pub fn new_ctx(config: ProxyConfig) -> PumpContext {
    PumpContext::new(Arc::new(config), Box::new(DefaultTokenCounter::default()))
}

/// Drive one client-originated JSON-RPC request through the pump.
///
/// If the proxy answers it locally (cache hit, tools-hash 304, search
/// meta-tool), returns that response directly. Otherwise the request is
/// forwarded; `upstream_result` supplies the upstream's `result` so the
/// response path can be exercised too.
#[allow(dead_code)]
pub async fn round_trip(ctx: &PumpContext, request: &Value, upstream_result: Option<Value>) -> Value {
    let line = request.to_string();
    match dispatch::handle_client_line(ctx, &line).await {
        ClientOutcome::Answered(response) => serde_json::from_str(&response).unwrap(),
        ClientOutcome::Forward(_info) => {
            let upstream_result = upstream_result
                .unwrap_or_else(|| panic!("forwarded request {request} needs an upstream_result"));
            let upstream_line = serde_json::json!({
                "jsonrpc": "2.0", "id": request["id"], "result": upstream_result,
            })
            .to_string();
            let out = dispatch::handle_upstream_line(ctx, &upstream_line)
                .await
                .expect("upstream response produces a client-visible frame");
            serde_json::from_str(&out).unwrap()
        }
        ClientOutcome::Drop => panic!("request {request} was dropped as malformed"),
    }
}

/// Forward an upstream error response for a pending request instead of a
/// success result.
#[allow(dead_code)]
pub async fn round_trip_error(ctx: &PumpContext, request: &Value, error: Value) -> Value {
    let line = request.to_string();
    match dispatch::handle_client_line(ctx, &line).await {
        ClientOutcome::Forward(_info) => {
            let upstream_line =
                serde_json::json!({"jsonrpc": "2.0", "id": request["id"], "error": error}).to_string();
            let out = dispatch::handle_upstream_line(ctx, &upstream_line).await.expect("frame");
            serde_json::from_str(&out).unwrap()
        }
        other => panic!("expected request to forward, got an immediate local answer: {:?}", other.describe()),
    }
}

#[allow(dead_code)]
pub fn tools_call(id: i64, name: &str, arguments: Value) -> Value {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "method": "tools/call", "params": {"name": name, "arguments": arguments}})
}

#[allow(dead_code)]
pub fn tools_list(id: i64, if_none_match: Option<&str>) -> Value {
    let mut params = serde_json::json!({});
    if let Some(hint) = if_none_match {
        params["_ultra_lean_mcp_proxy"] = serde_json::json!({"tools_hash_sync": {"if_none_match": hint}});
    }
    serde_json::json!({"jsonrpc": "2.0", "id": id, "method": "tools/list", "params": params})
}

#[allow(dead_code)]
pub fn initialize(id: i64, advertise_tools_hash_sync: bool) -> Value {
    let mut params = serde_json::json!({});
    if advertise_tools_hash_sync {
        params["capabilities"] = serde_json::json!({
            "experimental": {"ultra_lean_mcp_proxy": {"tools_hash_sync": {"version": 1}}}
        });
    }
    serde_json::json!({"jsonrpc": "2.0", "id": id, "method": "initialize", "params": params})
}

trait DescribeOutcome {
    fn describe(&self) -> &'static str;
}

impl DescribeOutcome for ClientOutcome {
    fn describe(&self) -> &'static str {
        match self {
            ClientOutcome::Answered(_) => "Answered",
            ClientOutcome::Forward(_) => "Forward",
            ClientOutcome::Drop => "Drop",
        }
    }
}
