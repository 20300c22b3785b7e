//! Running metrics counters annotated onto responses and summarized on
//! shutdown when `--stats` is set.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Stats {
    pub upstream_requests: AtomicU64,
    pub upstream_request_tokens: AtomicU64,
    pub upstream_request_bytes: AtomicU64,
    pub upstream_responses: AtomicU64,
    pub upstream_response_tokens: AtomicU64,
    pub upstream_response_bytes: AtomicU64,

    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub tools_list_saved_bytes: AtomicU64,
    pub result_compression_saved_bytes: AtomicU64,
    pub delta_emissions: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub upstream_requests: u64,
    pub upstream_request_tokens: u64,
    pub upstream_request_bytes: u64,
    pub upstream_responses: u64,
    pub upstream_response_tokens: u64,
    pub upstream_response_bytes: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_upstream_request(&self, tokens: u64, bytes: u64) {
        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
        self.upstream_request_tokens.fetch_add(tokens, Ordering::Relaxed);
        self.upstream_request_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_upstream_response(&self, tokens: u64, bytes: u64) {
        self.upstream_responses.fetch_add(1, Ordering::Relaxed);
        self.upstream_response_tokens.fetch_add(tokens, Ordering::Relaxed);
        self.upstream_response_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tools_list_savings(&self, bytes: i64) {
        if bytes > 0 {
            self.tools_list_saved_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    pub fn record_result_compression_savings(&self, bytes: i64) {
        if bytes > 0 {
            self.result_compression_saved_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        }
    }

    pub fn record_delta_emission(&self) {
        self.delta_emissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            upstream_requests: self.upstream_requests.load(Ordering::Relaxed),
            upstream_request_tokens: self.upstream_request_tokens.load(Ordering::Relaxed),
            upstream_request_bytes: self.upstream_request_bytes.load(Ordering::Relaxed),
            upstream_responses: self.upstream_responses.load(Ordering::Relaxed),
            upstream_response_tokens: self.upstream_response_tokens.load(Ordering::Relaxed),
            upstream_response_bytes: self.upstream_response_bytes.load(Ordering::Relaxed),
        }
    }

    /// One-line, info-level, human-readable shutdown summary (stderr only).
    pub fn summary_line(&self) -> String {
        format!(
            "lapc stats: upstream_requests={} upstream_responses={} cache_hits={} cache_misses={} \
             tools_list_saved_bytes={} result_compression_saved_bytes={} delta_emissions={}",
            self.upstream_requests.load(Ordering::Relaxed),
            self.upstream_responses.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.tools_list_saved_bytes.load(Ordering::Relaxed),
            self.result_compression_saved_bytes.load(Ordering::Relaxed),
            self.delta_emissions.load(Ordering::Relaxed),
        )
    }
}
