//! `ProxyConfig`: the resolved, immutable per-process configuration surface.
//!
//! The CLI/config *merger* (file + env + flag precedence, hot reload,
//! multi-file merge) is an external collaborator and out of scope here.
//! This module only defines the resolved value type plus a minimal
//! single-source TOML/YAML file loader, since the core crate must be
//! constructible and runnable end-to-end on its own.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// Either a plain bool or a detailed per-tool override. Any other shape
/// fails deserialization at config-load time (Open Question ii).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOverrideValue {
    Enabled(bool),
    Detailed {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        ttl_seconds: Option<u64>,
    },
}

impl ToolOverrideValue {
    pub fn enabled(&self) -> Option<bool> {
        match self {
            ToolOverrideValue::Enabled(b) => Some(*b),
            ToolOverrideValue::Detailed { enabled, .. } => *enabled,
        }
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        match self {
            ToolOverrideValue::Enabled(_) => None,
            ToolOverrideValue::Detailed { ttl_seconds, .. } => *ttl_seconds,
        }
    }
}

pub type ToolOverrides = HashMap<String, HashMap<String, ToolOverrideValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LazyMode {
    Off,
    Minimal,
    SearchOnly,
    Catalog,
}

impl Default for LazyMode {
    fn default() -> Self {
        LazyMode::Off
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub session_id: String,
    pub server_name: String,
    pub stats: bool,
    pub strict_token_counting: bool,

    pub definition_compression_enabled: bool,

    pub lazy_loading_enabled: bool,
    pub lazy_mode: LazyMode,
    pub lazy_top_k: usize,
    pub lazy_min_tools: usize,
    pub lazy_min_tokens: usize,
    pub lazy_min_confidence_score: f64,
    pub lazy_fallback_full_on_low_confidence: bool,

    pub tools_hash_sync_enabled: bool,
    pub tools_hash_sync_algorithm: String,
    pub tools_hash_sync_refresh_interval: u64,
    pub tools_hash_sync_include_server_fingerprint: bool,

    pub result_compression_enabled: bool,
    pub result_compression_mode: crate::compression::CompressionMode,
    pub result_min_payload_bytes: usize,
    pub result_strip_nulls: bool,
    pub result_strip_defaults: bool,
    pub result_min_token_savings_abs: i64,
    pub result_min_token_savings_ratio: f64,
    pub result_min_compressibility: f64,
    pub result_shared_key_registry: bool,
    pub result_key_bootstrap_interval: u64,
    pub result_minify_redundant_text: bool,

    pub delta_responses_enabled: bool,
    pub delta_min_savings_ratio: f64,
    pub delta_max_patch_bytes: usize,
    pub delta_max_patch_ratio: f64,
    pub delta_snapshot_interval: u64,

    pub caching_enabled: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub cache_errors: bool,
    pub cache_mutating_tools: bool,
    pub cache_adaptive_ttl: bool,
    pub cache_ttl_min_seconds: u64,
    pub cache_ttl_max_seconds: u64,

    pub auto_disable_enabled: bool,
    pub auto_disable_threshold: u32,
    pub auto_disable_cooldown_requests: u32,

    pub tool_overrides: ToolOverrides,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            session_id: "default".to_string(),
            server_name: "default".to_string(),
            stats: false,
            strict_token_counting: false,

            definition_compression_enabled: true,

            lazy_loading_enabled: false,
            lazy_mode: LazyMode::Off,
            lazy_top_k: 8,
            lazy_min_tools: 30,
            lazy_min_tokens: 8000,
            lazy_min_confidence_score: 2.0,
            lazy_fallback_full_on_low_confidence: true,

            tools_hash_sync_enabled: false,
            tools_hash_sync_algorithm: "sha256".to_string(),
            tools_hash_sync_refresh_interval: 50,
            tools_hash_sync_include_server_fingerprint: true,

            result_compression_enabled: false,
            result_compression_mode: crate::compression::CompressionMode::Balanced,
            result_min_payload_bytes: 512,
            result_strip_nulls: false,
            result_strip_defaults: false,
            result_min_token_savings_abs: 100,
            result_min_token_savings_ratio: 0.05,
            result_min_compressibility: 0.2,
            result_shared_key_registry: true,
            result_key_bootstrap_interval: 8,
            result_minify_redundant_text: true,

            delta_responses_enabled: false,
            delta_min_savings_ratio: 0.15,
            delta_max_patch_bytes: 65536,
            delta_max_patch_ratio: 0.8,
            delta_snapshot_interval: 5,

            caching_enabled: false,
            cache_ttl_seconds: 300,
            cache_max_entries: 5000,
            cache_errors: false,
            cache_mutating_tools: false,
            cache_adaptive_ttl: true,
            cache_ttl_min_seconds: 30,
            cache_ttl_max_seconds: 1800,

            auto_disable_enabled: true,
            auto_disable_threshold: 3,
            auto_disable_cooldown_requests: 20,

            tool_overrides: HashMap::new(),
        }
    }
}

impl ProxyConfig {
    /// Resolve whether `feature_name` is enabled for `tool_name`, honoring
    /// a per-tool override when present, else falling back to `default`.
    pub fn feature_enabled_for_tool(&self, tool_name: &str, feature_name: &str, default: bool) -> bool {
        self.tool_overrides
            .get(tool_name)
            .and_then(|features| features.get(feature_name))
            .and_then(|v| v.enabled())
            .unwrap_or(default)
    }

    /// Per-tool TTL override in seconds, if configured.
    pub fn ttl_override_for_tool(&self, tool_name: &str, feature_name: &str) -> Option<u64> {
        self.tool_overrides
            .get(tool_name)
            .and_then(|features| features.get(feature_name))
            .and_then(|v| v.ttl_seconds())
    }

    /// Load from a single TOML or YAML file (extension-driven). Does not
    /// merge with environment variables, flags, or other files.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match ext.as_str() {
            "toml" => toml::from_str(&text)
                .map_err(|e| ProxyError::Config(format!("invalid TOML config: {e}"))),
            "yaml" | "yml" => serde_yaml::from_str(&text)
                .map_err(|e| ProxyError::Config(format!("invalid YAML config: {e}"))),
            other => Err(ProxyError::Config(format!(
                "unsupported config file extension: .{other}"
            ))),
        }
    }
}
