//! HTTP embedding client.

use async_trait::async_trait;
use log::debug;
use mnemo_config::EmbeddingConfig;
use mnemo_protocol::{EmbeddingError, EmbeddingProvider};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Embedding client for Ollama-style and OpenAI-compatible endpoints.
///
/// Tries the native Ollama `/api/embed` route first, then falls back to
/// `/v1/embeddings` on the same base URL, so one config key covers both
/// server families.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbeddingData>,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        decode_ollama(status, &body)
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        decode_openai(status, &body)
    }
}

fn decode_ollama(status: reqwest::StatusCode, body: &str) -> Result<Vec<f32>, EmbeddingError> {
    if !status.is_success() {
        return Err(EmbeddingError::Request(format!(
            "embed endpoint returned {}",
            status
        )));
    }
    let parsed: OllamaEmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
    parsed
        .embeddings
        .into_iter()
        .next()
        .filter(|v| !v.is_empty())
        .ok_or(EmbeddingError::Empty)
}

fn decode_openai(status: reqwest::StatusCode, body: &str) -> Result<Vec<f32>, EmbeddingError> {
    if !status.is_success() {
        return Err(EmbeddingError::Request(format!(
            "embeddings endpoint returned {}",
            status
        )));
    }
    let parsed: OpenAiEmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or(EmbeddingError::Empty)
}

#[cfg(test)]
mod tests {
    use super::{decode_ollama, decode_openai};
    use mnemo_protocol::EmbeddingError;
    use reqwest::StatusCode;

    #[test]
    fn non_success_status_maps_to_request_error() {
        let err = decode_ollama(StatusCode::INTERNAL_SERVER_ERROR, "busy").unwrap_err();
        assert!(matches!(err, EmbeddingError::Request(_)));
        let err = decode_openai(StatusCode::NOT_FOUND, "{}").unwrap_err();
        assert!(matches!(err, EmbeddingError::Request(_)));
    }

    #[test]
    fn undecodable_body_maps_to_malformed() {
        let err = decode_ollama(StatusCode::OK, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, EmbeddingError::Malformed(_)));
        let err = decode_openai(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, EmbeddingError::Malformed(_)));
    }

    #[test]
    fn missing_or_empty_vector_maps_to_empty() {
        let err = decode_ollama(StatusCode::OK, r#"{"embeddings": []}"#).unwrap_err();
        assert!(matches!(err, EmbeddingError::Empty));
        let err = decode_ollama(StatusCode::OK, r#"{"embeddings": [[]]}"#).unwrap_err();
        assert!(matches!(err, EmbeddingError::Empty));
        let err = decode_openai(StatusCode::OK, r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err, EmbeddingError::Empty));
    }

    #[test]
    fn first_vector_is_returned_from_either_shape() {
        let vector =
            decode_ollama(StatusCode::OK, r#"{"embeddings": [[0.5, 0.25]]}"#).unwrap();
        assert_eq!(vector, vec![0.5, 0.25]);
        let vector = decode_openai(
            StatusCode::OK,
            r#"{"data": [{"embedding": [1.0, 0.0]}], "model": "m"}"#,
        )
        .unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self.embed_ollama(text).await {
            Ok(vector) => Ok(vector),
            Err(first) => {
                debug!("ollama embed route failed, trying openai route: {}", first);
                self.embed_openai(text).await
            }
        }
    }
}
