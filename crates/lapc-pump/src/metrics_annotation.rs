//! Appends the `runtime_metrics` stats snapshot onto outgoing responses
//! when `--stats` is on (§6.2).

use lapc_core::stats::Stats;
use lapc_core::EXT_ANNOTATION_KEY;
use serde_json::Value;

fn merge_runtime_metrics(target: &mut Value, stats: &Stats) {
    let Some(obj) = target.as_object_mut() else { return };
    let ext = obj
        .entry(EXT_ANNOTATION_KEY.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(ext_obj) = ext.as_object_mut() {
        let snapshot = serde_json::to_value(stats.snapshot()).unwrap_or(Value::Null);
        ext_obj.insert("runtime_metrics".to_string(), snapshot);
    }
}

/// Annotate `response` in place. Successful responses carry a `result`
/// object and are annotated there, alongside any `tools_hash_sync` or
/// `result_compression` annotations already present. Error responses carry
/// no `result`, so the snapshot is attached at the top level instead —
/// both are still "the response", matching §7's "forwarded with the
/// metrics annotation if stats is on".
pub fn annotate_response(response: &mut Value, stats: &Stats, stats_enabled: bool) {
    if !stats_enabled {
        return;
    }
    if response.get("result").is_some() {
        if let Some(result) = response.get_mut("result") {
            merge_runtime_metrics(result, stats);
        }
    } else {
        merge_runtime_metrics(response, stats);
    }
}
