//! Mutating-tool-name classification.
//!
//! `is_mutating_tool_name` matches case-insensitively against a fixed verb
//! list using a single `AhoCorasick` automaton built once, giving
//! `O(name length)` substring matching against the whole verb set instead
//! of scanning each verb with `str::contains` in turn.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

const MUTATING_VERBS: &[&str] = &[
    "create", "update", "delete", "remove", "set", "write", "insert", "patch", "post", "put",
    "merge", "upload", "commit", "navigate", "open", "close", "click", "type", "press", "select",
    "hover", "drag", "drop", "scroll", "evaluate", "execute", "goto", "reload", "back", "forward",
];

static AUTOMATON: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(MUTATING_VERBS)
        .expect("static verb list always builds")
});

/// True if `tool_name` contains any mutating verb as a case-insensitive
/// substring.
pub fn is_mutating_tool_name(tool_name: &str) -> bool {
    AUTOMATON.is_match(tool_name)
}
