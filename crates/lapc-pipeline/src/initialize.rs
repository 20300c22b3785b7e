//! `initialize` capability negotiation for tools-hash-sync.

use lapc_core::EXT_NAME;
use serde_json::Value;

/// True if the client's `initialize` params signal
/// `capabilities.experimental.<ext>.tools_hash_sync.version` of `1` or `"1"`.
pub fn client_supports_tools_hash_sync(params: &Value) -> bool {
    let version = params
        .pointer(&format!("/capabilities/experimental/{EXT_NAME}/tools_hash_sync/version"));
    match version {
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => s == "1",
        _ => false,
    }
}

/// Inject the matching server capability advertisement into a successful
/// `initialize` result, if the client supported the extension. Returns
/// `true` if the advertisement was injected.
pub fn inject_server_capability(result: &mut Value, client_supported: bool) -> bool {
    if !client_supported || !result.is_object() {
        return false;
    }
    let obj = result.as_object_mut().expect("checked above");
    let capabilities = obj
        .entry("capabilities")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let Some(capabilities) = capabilities.as_object_mut() else { return false };
    let experimental = capabilities
        .entry("experimental")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let Some(experimental) = experimental.as_object_mut() else { return false };
    let ext = experimental
        .entry(EXT_NAME.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let Some(ext) = ext.as_object_mut() else { return false };
    ext.insert(
        "tools_hash_sync".to_string(),
        serde_json::json!({"version": 1, "algorithm": "sha256"}),
    );
    true
}
