//! Error types for engine operations.

use mnemo_protocol::{EmbeddingError, ExtractionError, LogError};

/// Errors returned by the memory engine and its store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// SQLite error.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Extraction provider failure.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),
    /// Conversation log failure.
    #[error("conversation log error: {0}")]
    Log(#[from] LogError),
}
