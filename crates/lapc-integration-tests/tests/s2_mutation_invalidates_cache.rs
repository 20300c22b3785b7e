//! S2 — a mutating tool call invalidates every cached read for the
//! session/server pair.

mod common;

use lapc_core::config::ProxyConfig;
use serde_json::json;

#[tokio::test]
async fn mutating_call_invalidates_cache() {
    let config = ProxyConfig { caching_enabled: true, cache_ttl_seconds: 60, ..Default::default() };
    let ctx = common::new_ctx(config);

    let first = common::tools_call(1, "list_items", json!({"page": 1}));
    let upstream_result = json!({"structuredContent": {"items": ["a"]}});
    common::round_trip(&ctx, &first, Some(upstream_result)).await;

    let cache_key = lapc_state::make_cache_key("default", "default", "list_items", &json!({"page": 1}));
    assert!(ctx.state.lock().await.cache.get(&cache_key).is_some());

    let mutate = common::tools_call(2, "create_issue", json!({"title": "bug"}));
    common::round_trip(&ctx, &mutate, Some(json!({"structuredContent": {"ok": true}}))).await;

    assert!(ctx.state.lock().await.cache.get(&cache_key).is_none());
}
