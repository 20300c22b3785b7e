//! JSON-Schema metadata pruning: keep only semantically-significant keys.

use serde_json::Value;

use crate::descriptions;

const ALWAYS_KEPT: &[&str] = &[
    "type", "required", "enum", "format", "pattern", "const", "$ref", "minimum", "maximum",
    "minLength", "maxLength", "minItems", "maxItems",
];

/// Strip a JSON-Schema fragment down to semantically-significant keys.
/// `description` is kept only at `depth <= 1`. Copies (never shares)
/// `required`/`enum` arrays with the input.
pub fn strip_schema_metadata(schema: &Value, depth: usize) -> Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = serde_json::Map::new();
    for key in ALWAYS_KEPT {
        if let Some(value) = obj.get(*key) {
            out.insert((*key).to_string(), value.clone());
        }
    }
    if depth <= 1
        && let Some(desc) = obj.get("description").and_then(Value::as_str)
    {
        out.insert("description".to_string(), Value::String(descriptions::compress_description(desc)));
    }
    if let Some(Value::Object(props)) = obj.get("properties") {
        let mut pruned = serde_json::Map::new();
        for (name, prop_schema) in props {
            pruned.insert(name.clone(), strip_schema_metadata(prop_schema, depth + 1));
        }
        out.insert("properties".to_string(), Value::Object(pruned));
    }
    if let Some(items) = obj.get("items") {
        let pruned = match items {
            Value::Array(list) => {
                Value::Array(list.iter().map(|i| strip_schema_metadata(i, depth + 1)).collect())
            }
            other => strip_schema_metadata(other, depth + 1),
        };
        out.insert("items".to_string(), pruned);
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(list)) = obj.get(key) {
            out.insert(
                key.to_string(),
                Value::Array(list.iter().map(|i| strip_schema_metadata(i, depth + 1)).collect()),
            );
        }
    }
    if let Some(not_schema) = obj.get("not") {
        out.insert("not".to_string(), strip_schema_metadata(not_schema, depth + 1));
    }
    Value::Object(out)
}
