//! Extraction service contract and wire schema.
//!
//! The extraction service turns a role-tagged transcript into structured
//! insights via a generative model with schema-constrained JSON output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Entity surfaced by the extraction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Entity name.
    pub name: String,
    /// Entity type (customer, product, order, preference, issue, ...).
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Free-text observations about the entity.
    #[serde(default)]
    pub observations: Vec<String>,
}

/// Directed relation between two extracted entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelation {
    /// Source entity name.
    #[serde(rename = "from")]
    pub from_entity: String,
    /// Target entity name.
    #[serde(rename = "to")]
    pub to_entity: String,
    /// Relation type (purchased, prefers, complained_about, ...).
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Edge strength in [0, 1].
    #[serde(default = "default_strength")]
    pub strength: f64,
}

/// Long-term memory candidate surfaced by the extraction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMemory {
    /// Memory content.
    pub content: String,
    /// Memory type (preference, fact, experience, pattern, general).
    #[serde(rename = "type", default = "default_memory_type")]
    pub memory_type: String,
    /// Importance score in [0, 1].
    #[serde(default = "default_importance")]
    pub importance: f64,
}

/// Structured insights extracted from one conversation transcript.
///
/// The default value (all lists empty, no summary) doubles as the
/// "no insights this round" outcome for empty transcripts and service
/// failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationInsights {
    /// Extracted entities.
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    /// Extracted relations.
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
    /// Extracted long-term memories.
    #[serde(default)]
    pub long_term_memories: Vec<ExtractedMemory>,
    /// Brief conversation summary.
    #[serde(default)]
    pub summary: Option<String>,
}

impl ConversationInsights {
    /// True when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relations.is_empty()
            && self.long_term_memories.is_empty()
            && self.summary.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

fn default_strength() -> f64 {
    1.0
}

fn default_memory_type() -> String {
    "general".to_string()
}

fn default_importance() -> f64 {
    0.5
}

/// Errors returned by extraction providers.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Transport-level failure (unreachable, timeout, non-2xx).
    #[error("extraction request failed: {0}")]
    Request(String),
    /// The model output was not valid insight JSON.
    #[error("malformed extraction output: {0}")]
    Malformed(String),
}

/// Transcript-to-insights extraction service.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Extract structured insights from a role-tagged transcript.
    async fn extract(&self, transcript: &str) -> Result<ConversationInsights, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::ConversationInsights;
    use pretty_assertions::assert_eq;

    #[test]
    fn insights_decode_with_schema_field_names() {
        let raw = r#"{
            "entities": [
                {"name": "Jane Doe", "type": "customer", "observations": ["bought a sectional"]}
            ],
            "relations": [
                {"from": "Jane Doe", "to": "Order #1", "type": "placed_order"}
            ],
            "long_term_memories": [
                {"content": "prefers gray fabric", "type": "preference", "importance": 0.9}
            ],
            "summary": "Jane asked about her sectional order."
        }"#;
        let insights: ConversationInsights = serde_json::from_str(raw).expect("decode");
        assert_eq!(insights.entities[0].entity_type, "customer");
        assert_eq!(insights.relations[0].from_entity, "Jane Doe");
        assert_eq!(insights.relations[0].strength, 1.0);
        assert_eq!(insights.long_term_memories[0].memory_type, "preference");
        assert_eq!(insights.is_empty(), false);
    }

    #[test]
    fn default_insights_are_empty() {
        let insights = ConversationInsights::default();
        assert_eq!(insights.is_empty(), true);

        let blank_summary: ConversationInsights =
            serde_json::from_str(r#"{"summary": "  "}"#).expect("decode");
        assert_eq!(blank_summary.is_empty(), true);
    }
}
