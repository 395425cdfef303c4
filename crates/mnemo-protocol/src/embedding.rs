//! Embedding service contract.

use async_trait::async_trait;

/// Errors returned by embedding providers.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Transport-level failure (unreachable, timeout, non-2xx).
    #[error("embedding request failed: {0}")]
    Request(String),
    /// The response could not be decoded into a vector.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
    /// The provider returned an empty vector.
    #[error("empty embedding vector")]
    Empty,
}

/// Text-to-vector embedding service.
///
/// Vectors must be comparable by cosine similarity across calls; callers on
/// the conversational path are expected to catch failures and degrade rather
/// than crash.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
