//! S3 — tools-hash-sync conditional fetch: a matching `if_none_match`
//! hint short-circuits the second `tools/list` without contacting
//! upstream.

mod common;

use lapc_core::config::ProxyConfig;
use serde_json::json;

fn sample_tools() -> serde_json::Value {
    json!({"tools": [
        {"name": "T1", "description": "first tool", "inputSchema": {"type": "object"}},
        {"name": "T2", "description": "second tool", "inputSchema": {"type": "object"}},
    ]})
}

#[tokio::test]
async fn negotiated_conditional_fetch_returns_304_without_upstream() {
    let config = ProxyConfig { tools_hash_sync_enabled: true, tools_hash_sync_refresh_interval: 50, ..Default::default() };
    let ctx = common::new_ctx(config);

    let init = common::initialize(1, true);
    let init_response = common::round_trip(&ctx, &init, Some(json!({}))).await;
    assert_eq!(
        init_response["result"]["capabilities"]["experimental"]["ultra_lean_mcp_proxy"]["tools_hash_sync"]["version"],
        1
    );

    let list1 = common::tools_list(2, None);
    let listed = common::round_trip(&ctx, &list1, Some(sample_tools())).await;
    assert_eq!(listed["result"]["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], false);
    let hash = listed["result"]["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["tools_hash"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(hash.starts_with("sha256:"));
    assert_eq!(listed["result"]["tools"].as_array().unwrap().len(), 2);

    let list2 = common::tools_list(3, Some(&hash));
    // No upstream_result supplied: this must be answered locally (304) per
    // §4.4, never reaching the forward path.
    let not_modified = common::round_trip(&ctx, &list2, None).await;
    assert_eq!(not_modified["result"]["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["not_modified"], true);
    assert_eq!(not_modified["result"]["_ultra_lean_mcp_proxy"]["tools_hash_sync"]["tools_hash"], hash);
    assert_eq!(not_modified["result"]["tools"].as_array().unwrap().len(), 0);
}
