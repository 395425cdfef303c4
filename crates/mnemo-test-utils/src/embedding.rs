use async_trait::async_trait;
use mnemo_protocol::{EmbeddingError, EmbeddingProvider};

const DIMENSIONS: usize = 256;

/// Deterministic bag-of-words embedding for tests.
///
/// Each whitespace-separated token is lowercased and hashed into one of
/// [`DIMENSIONS`] buckets, so texts sharing vocabulary produce vectors with
/// genuinely high cosine similarity while unrelated texts land near zero.
/// No network, no model, fully reproducible.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedding;

impl HashEmbedding {
    pub fn new() -> Self {
        Self
    }

    fn bucket(token: &str) -> usize {
        // FNV-1a over the lowercased token bytes.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        (hash % DIMENSIONS as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        for token in text.split_whitespace() {
            let token: String = token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            vector[Self::bucket(&token)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

/// Embedding provider that always returns the same vector.
#[derive(Debug, Clone)]
pub struct FixedEmbedding {
    vector: Vec<f32>,
}

impl FixedEmbedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector.clone())
    }
}

/// Embedding provider that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbedding;

impl FailingEmbedding {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Request("embedding stub failure".to_string()))
    }
}
