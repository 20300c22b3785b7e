//! Error types for the LAPC optimization core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("optimization failure: {0}")]
    Optimization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream protocol violation: {0}")]
    UpstreamProtocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
