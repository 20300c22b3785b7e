//! Approximate token cost estimation for JSON values.
//!
//! Tries the `cl100k_base` BPE encoding (the well-known GPT-style vocabulary,
//! via `tiktoken-rs`) first; when construction fails and `strict` mode is
//! off, falls back to the deterministic heuristic `max(1, len(text)/4)`.

use once_cell::sync::OnceCell;
use serde_json::Value;
use tiktoken_rs::CoreBPE;

use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBackend {
    Bpe,
    Heuristic,
}

impl TokenBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenBackend::Bpe => "bpe",
            TokenBackend::Heuristic => "heuristic",
        }
    }
}

/// Counts the token cost of the canonical JSON text of a value.
pub trait TokenCounter: Send + Sync {
    fn count(&self, value: &Value) -> usize;
    fn backend(&self) -> TokenBackend;
}

fn cl100k_base() -> &'static Option<CoreBPE> {
    static ENCODING: OnceCell<Option<CoreBPE>> = OnceCell::new();
    ENCODING.get_or_init(|| tiktoken_rs::cl100k_base().ok())
}

/// Default token counter: BPE when available, heuristic fallback otherwise.
pub struct DefaultTokenCounter {
    backend: TokenBackend,
}

impl DefaultTokenCounter {
    /// Construct a counter, attempting the BPE backend first.
    ///
    /// When `strict` is true and the BPE backend cannot be constructed,
    /// returns `ProxyError::Config` instead of silently falling back.
    pub fn new(strict: bool) -> Result<Self> {
        let backend = if cl100k_base().is_some() {
            TokenBackend::Bpe
        } else if strict {
            return Err(ProxyError::Config(
                "strict token counting requested but the cl100k_base BPE encoding is unavailable"
                    .to_string(),
            ));
        } else {
            tracing::warn!("BPE tokenizer unavailable, falling back to heuristic token counter");
            TokenBackend::Heuristic
        };
        Ok(Self { backend })
    }
}

impl Default for DefaultTokenCounter {
    fn default() -> Self {
        // Non-strict construction never fails.
        Self::new(false).expect("non-strict construction is infallible")
    }
}

impl TokenCounter for DefaultTokenCounter {
    fn count(&self, value: &Value) -> usize {
        let text = serde_json::to_string(value).unwrap_or_default();
        match self.backend {
            TokenBackend::Bpe => {
                if let Some(enc) = cl100k_base() {
                    return enc.encode_with_special_tokens(&text).len();
                }
                heuristic_count(&text)
            }
            TokenBackend::Heuristic => heuristic_count(&text),
        }
    }

    fn backend(&self) -> TokenBackend {
        self.backend
    }
}

fn heuristic_count(text: &str) -> usize {
    std::cmp::max(1, text.len() / 4)
}
