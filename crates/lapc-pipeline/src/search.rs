//! The proxy-local search meta-tool: ranks the indexed tool manifest
//! against a free-text query so lazy-loaded clients can discover tools by
//! name, description, or parameter text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TERM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z0-9_]+").unwrap());

#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub name: String,
    pub score: f64,
    pub description: String,
    pub input_schema: Option<Value>,
}

fn tokenize(text: &str) -> Vec<String> {
    TERM_RE.find_iter(&text.to_lowercase()).map(|m| m.as_str().to_string()).collect()
}

fn params_text(tool: &Value) -> String {
    tool.pointer("/inputSchema/properties")
        .and_then(|v| v.as_object())
        .map(|props| props.keys().cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
        .to_lowercase()
}

fn score_tool(query: &str, terms: &[String], tool: &Value) -> f64 {
    let name = tool.get("name").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
    let description = tool.get("description").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
    let params = params_text(tool);
    let concat = format!("{name} {description} {params}");

    let mut score = 0.0;
    if name.contains(&query.to_lowercase()) {
        score += 4.0;
    }
    for term in terms {
        if name.contains(term.as_str()) {
            score += 2.0;
        }
        if description.contains(term.as_str()) {
            score += 1.0;
        }
        if params.contains(term.as_str()) {
            score += 1.25;
        }
        if concat.contains(term.as_str()) {
            score += 0.2;
        }
    }
    score
}

/// Rank `tools` against `query`, returning the top `top_k` matches. Falls
/// back to returning all tools at `score = 0.01` if none score positively,
/// so the client always gets a non-empty response.
pub fn rank_tools(query: &str, tools: &[Value], top_k: usize) -> Vec<SearchMatch> {
    let terms = tokenize(query);
    let mut scored: Vec<(f64, &Value)> = tools.iter().map(|t| (score_tool(query, &terms, t), t)).collect();

    let any_positive = scored.iter().any(|(s, _)| *s > 0.0);
    if !any_positive {
        scored = tools.iter().map(|t| (0.01, t)).collect();
    } else {
        scored.retain(|(s, _)| *s > 0.0);
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(top_k.max(1))
        .map(|(score, tool)| SearchMatch {
            name: tool.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            score: (score * 1000.0).round() / 1000.0,
            description: tool.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            input_schema: tool.get("inputSchema").cloned(),
        })
        .collect()
}

/// Build the `tools/call` result for the reserved search meta-tool.
pub fn build_search_result(
    server: &str,
    query: &str,
    tools: &[Value],
    top_k: usize,
    include_schemas: bool,
    min_confidence: f64,
    fallback_full_on_low_confidence: bool,
) -> Value {
    let matches = rank_tools(query, tools, top_k);
    let top_score = matches.first().map(|m| m.score).unwrap_or(0.0);

    let matches_json: Vec<Value> = matches
        .iter()
        .map(|m| {
            let mut obj = serde_json::json!({
                "name": m.name,
                "score": m.score,
                "description": m.description,
            });
            if include_schemas && let Some(schema) = &m.input_schema {
                obj["inputSchema"] = schema.clone();
            }
            obj
        })
        .collect();

    let mut result = serde_json::json!({
        "server": server,
        "query": query,
        "count": matches_json.len(),
        "matches": matches_json,
    });

    if top_score < min_confidence && fallback_full_on_low_confidence {
        result["fallback"] = Value::String("full_tools_due_low_confidence".to_string());
        result["top_score"] = serde_json::json!(top_score);
        result["tools"] = Value::Array(tools.to_vec());
    }

    result
}
