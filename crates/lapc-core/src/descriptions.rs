//! Rule-based tool-description compression.
//!
//! Applies the fixed, ordered table of case-insensitive regex replacements
//! from the wire contract. Implementations must apply exactly these rules
//! in this order to claim bit-compatibility of compressed descriptions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(&format!("(?i){pattern}")).expect("static pattern is valid"),
        replacement,
    }
}

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        // Filler removal
        rule(r"\bThis tool (?:will |can |is used to |enables (?:you|users|LLMs|AI assistants) to |allows (?:you|users|LLMs|AI assistants) to )", ""),
        rule(r"\bThis server (?:enables|allows|provides)\b", ""),
        rule(r"\bThis operation (?:will|can)\b", ""),
        rule(r"\bYou can use this (?:tool |to )\b", ""),
        rule(r"\bProvides? (?:the )?ability to\b", ""),
        rule(r"\bProvides? access to\b", "Access"),
        rule(r"\bGives? (?:you )?access to\b", "Access"),
        rule(r"\bmust be provided\b", "required"),
        rule(r"\bshould be provided\b", "recommended"),
        rule(r"\bcan be used (?:to |for )\b", "for "),
        rule(r"\bEnables you to\b", ""),
        rule(r"\bAllows you to\b", ""),
        // Simplifiers
        rule(r"\bin order to\b", "to"),
        rule(r"\bas well as\b", "and"),
        rule(r"\bprior to\b", "before"),
        rule(r"\bwith respect to\b", "for"),
        // Qualifiers removed
        rule(r"\bvery\b", ""),
        rule(r"\bsimply\b", ""),
        rule(r"\bbasically\b", ""),
        rule(r"\bessentially\b", ""),
        // Term shortenings
        rule(r"\brepository\b", "repo"),
        rule(r"\bconfiguration\b", "config"),
        rule(r"\binformation\b", "info"),
        rule(r"\bdocumentation\b", "docs"),
        rule(r"\bapplication\b", "app"),
        rule(r"\bdatabase\b", "DB"),
        rule(r"\benvironment\b", "env"),
        rule(r"\bparameters\b", "params"),
        rule(r"\bparameter\b", "param"),
        // Verb shortenings
        rule(r"\bretrieve(?:s)?\b", "get"),
        rule(r"\bfetch(?:es)?\b", "get"),
        rule(r"\bexecute(?:s)?\b", "run"),
        rule(r"\bgenerate(?:s)?\b", "create"),
        // Note shortenings
        rule(r"\bfor example\b", "e.g."),
        rule(r"\bsuch as\b", "like"),
        // Cleanup
        rule(r"  +", " "),
        rule(r" +([.,;:])", "$1"),
        rule(r"^\s+|\s+$", ""),
    ]
});

static COLLAPSE_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());
static SENTENCE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\. )([a-z])").unwrap());

/// Apply the compression rule table to a tool description, in order.
/// Descriptions under 20 characters are returned unchanged.
pub fn compress_description(desc: &str) -> String {
    if desc.len() < 20 {
        return desc.to_string();
    }
    let mut result = desc.to_string();
    for r in RULES.iter() {
        result = r.pattern.replace_all(&result, r.replacement).into_owned();
    }
    result = COLLAPSE_DOTS.replace_all(&result, ".").into_owned();
    result = SENTENCE_START
        .replace_all(&result, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], caps[2].to_uppercase())
        })
        .into_owned();
    if let Some(first) = result.chars().next()
        && first.is_lowercase()
    {
        let mut upper = first.to_uppercase().collect::<String>();
        upper.push_str(&result[first.len_utf8()..]);
        result = upper;
    }
    result.trim().to_string()
}

/// Recursively compress `description` fields in a JSON Schema fragment, in
/// place (`properties` and `items` only — this is definition compression,
/// not the lazy-mode metadata pruning in `schema::strip_schema_metadata`).
/// All other schema keys (`title`, `$schema`, `additionalProperties`,
/// `examples`, `default`, ...) are left untouched.
pub fn compress_schema(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else { return };
    if let Some(desc) = obj.get("description").and_then(|v| v.as_str()) {
        let compressed = compress_description(desc);
        obj.insert("description".to_string(), Value::String(compressed));
    }
    if let Some(Value::Object(props)) = obj.get_mut("properties") {
        for prop_schema in props.values_mut() {
            compress_schema(prop_schema);
        }
    }
    if let Some(items) = obj.get_mut("items")
        && items.is_object()
    {
        compress_schema(items);
    }
}
