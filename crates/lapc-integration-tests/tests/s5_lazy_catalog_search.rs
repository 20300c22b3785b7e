//! S5 — lazy catalog mode exposes bare stubs plus a search meta-tool, and
//! the meta-tool answers `tools/call` locally without contacting upstream.

mod common;

use lapc_core::config::{LazyMode, ProxyConfig};
use serde_json::json;

fn ten_tools() -> serde_json::Value {
    let tools: Vec<serde_json::Value> = (0..10)
        .map(|i| json!({"name": format!("tool_{i}"), "description": "does a thing", "inputSchema": {"type": "object"}}))
        .collect();
    json!({"tools": tools})
}

#[tokio::test]
async fn catalog_mode_and_search_meta_tool() {
    let config = ProxyConfig {
        lazy_loading_enabled: true,
        lazy_mode: LazyMode::Catalog,
        lazy_min_tools: 5,
        ..Default::default()
    };
    let ctx = common::new_ctx(config);

    let listed = common::round_trip(&ctx, &common::tools_list(1, None), Some(ten_tools())).await;
    let tools = listed["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 11); // 10 bare stubs + the search meta-tool
    assert!(tools[0].get("description").is_none(), "catalog stubs carry no description");
    assert_eq!(tools[0]["inputSchema"], json!({"type": "object"}));
    let meta = tools.iter().find(|t| t["name"] == lapc_core::SEARCH_TOOL_NAME).unwrap();
    assert!(meta["description"].as_str().unwrap().contains("tool_7"));

    let search = common::tools_call(2, lapc_core::SEARCH_TOOL_NAME, json!({"query": "tool_7"}));
    // No upstream_result: the meta-tool must answer locally.
    let answered = common::round_trip(&ctx, &search, None).await;
    assert_eq!(answered["result"]["structuredContent"]["server"], "default");
    assert_eq!(answered["result"]["structuredContent"]["query"], "tool_7");
    assert_eq!(answered["result"]["structuredContent"]["count"], 1);
    assert_eq!(answered["result"]["structuredContent"]["matches"][0]["name"], "tool_7");
    // substring-of-name (+4), term-in-name (+2), and term-in-haystack (+0.2)
    // all fire when the whole query is itself one token equal to the name.
    assert_eq!(answered["result"]["structuredContent"]["matches"][0]["score"], 6.2);
}
