//! HTTP insight-extraction client.

use async_trait::async_trait;
use mnemo_config::ExtractionConfig;
use mnemo_protocol::{ConversationInsights, ExtractionError, ExtractionProvider};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You analyze customer service conversations for a \
furniture retailer and extract structured information. Respond with a single \
JSON object with these keys:\n\
- \"entities\": array of {\"name\", \"type\", \"observations\"} where type is one \
of customer, product, order, preference, issue and observations is an array of \
short factual strings\n\
- \"relations\": array of {\"from\", \"to\", \"type\", \"strength\"} linking entity \
names, strength between 0 and 1\n\
- \"long_term_memories\": array of {\"content\", \"type\", \"importance\"} where \
type is one of preference, fact, experience, pattern and importance is between \
0 and 1\n\
- \"summary\": one or two sentences summarizing the conversation\n\
Only include information actually present in the conversation. Use empty \
arrays when nothing qualifies.";

/// Extraction client for OpenAI-compatible chat-completions endpoints.
///
/// Requests schema-constrained JSON output at low temperature; anything the
/// model returns that fails to decode is reported as malformed and treated
/// upstream as an empty extraction round.
pub struct HttpExtractionClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl HttpExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }
}

/// Strip an optional markdown code fence from model output.
fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl ExtractionProvider for HttpExtractionClient {
    async fn extract(&self, transcript: &str) -> Result<ConversationInsights, ExtractionError> {
        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": transcript },
                ],
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        decode_chat(status, &body)
    }
}

fn decode_chat(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<ConversationInsights, ExtractionError> {
    if !status.is_success() {
        return Err(ExtractionError::Request(format!(
            "chat completions endpoint returned {}",
            status
        )));
    }
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ExtractionError::Malformed("no choices in response".to_string()))?;
    serde_json::from_str(strip_fence(&content))
        .map_err(|e| ExtractionError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{decode_chat, strip_fence};
    use mnemo_protocol::ExtractionError;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fence("```\n{}\n```"), "{}");
    }

    #[test]
    fn non_success_status_maps_to_request_error() {
        let err = decode_chat(StatusCode::TOO_MANY_REQUESTS, "slow down").unwrap_err();
        assert!(matches!(err, ExtractionError::Request(_)));
    }

    #[test]
    fn undecodable_envelope_or_content_maps_to_malformed() {
        let err = decode_chat(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));

        let err = decode_chat(StatusCode::OK, r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));

        let envelope = r#"{"choices": [{"message": {"content": "no json here"}}]}"#;
        let err = decode_chat(StatusCode::OK, envelope).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn fenced_model_output_decodes() {
        let content = "```json\n{\"summary\": \"Jane asked about delivery.\"}\n```";
        let envelope = serde_json::json!({
            "choices": [{ "message": { "content": content } }]
        })
        .to_string();
        let insights = decode_chat(StatusCode::OK, &envelope).expect("decode");
        assert_eq!(insights.summary.as_deref(), Some("Jane asked about delivery."));
    }
}
