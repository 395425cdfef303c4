//! Persistent record models for the three structured substores.

use chrono::{DateTime, Utc};
use mnemo_protocol::{ConversationId, ExtractedEntity, ExtractedMemory, ExtractedRelation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node in the entity/relation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntity {
    /// Entity identifier.
    pub id: Uuid,
    /// Entity name as extracted; not unique per owner.
    pub name: String,
    /// Entity type (customer, product, order, preference, issue, ...).
    pub entity_type: String,
    /// Accumulated free-text observations.
    pub observations: Vec<String>,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub last_updated: DateTime<Utc>,
    /// Open-ended metadata payload.
    pub metadata: serde_json::Value,
    /// Owner the entity is scoped to.
    pub owner: String,
}

impl MemoryEntity {
    /// Text submitted to the embedding service for this entity.
    pub fn embedding_text(name: &str, entity_type: &str, observations: &[String]) -> String {
        format!("{} {} {}", name, entity_type, observations.join(" "))
    }
}

/// Directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRelation {
    /// Relation identifier.
    pub id: Uuid,
    /// Source entity id.
    pub from_entity_id: Uuid,
    /// Target entity id.
    pub to_entity_id: Uuid,
    /// Relation type (purchased, prefers, complained_about, ...).
    pub relation_type: String,
    /// Edge strength in [0, 1].
    pub strength: f64,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Open-ended metadata payload.
    pub metadata: serde_json::Value,
}

/// Standalone fact in long-term semantic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    /// Memory identifier.
    pub id: Uuid,
    /// Owner the memory is scoped to.
    pub owner: String,
    /// Memory content.
    pub content: String,
    /// Memory type (preference, fact, experience, pattern, general).
    pub memory_type: String,
    /// Importance score in [0, 1]; the primary ranking key.
    pub importance_score: f64,
    /// Number of times retrieval has returned this memory.
    pub access_count: i64,
    /// Timestamp of the most recent retrieval.
    pub last_accessed: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Conversation the memory was extracted from, if any.
    pub source_conversation_id: Option<ConversationId>,
}

/// Condensed summary of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Summary identifier.
    pub id: Uuid,
    /// Conversation the summary condenses.
    pub conversation_id: ConversationId,
    /// Summary text.
    pub summary_text: String,
    /// Names of entities mentioned in the conversation.
    pub key_entities: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Owner the summary is scoped to.
    pub owner: String,
}

/// Per-owner record counts across the substores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Entity rows owned.
    pub entity_count: usize,
    /// Relation rows whose source entity is owned.
    pub relation_count: usize,
    /// Long-term memory rows owned.
    pub memory_count: usize,
    /// Conversation summary rows owned.
    pub summary_count: usize,
}

/// Record counts across every owner, for system introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalMemoryStats {
    /// Totals over all owners.
    pub totals: MemoryStats,
    /// Distinct owners present in the entity table.
    pub unique_owners: usize,
}

/// Input for creating an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: Vec::new(),
            confidence: default_confidence(),
            metadata: default_metadata(),
        }
    }

    pub fn with_observations(mut self, observations: Vec<String>) -> Self {
        self.observations = observations;
        self
    }
}

impl From<ExtractedEntity> for EntityDraft {
    fn from(extracted: ExtractedEntity) -> Self {
        Self {
            name: extracted.name,
            entity_type: extracted.entity_type,
            observations: extracted.observations,
            confidence: default_confidence(),
            metadata: default_metadata(),
        }
    }
}

/// Input for creating a relation; endpoints are resolved by name within the
/// owner at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDraft {
    #[serde(rename = "from")]
    pub from_entity: String,
    #[serde(rename = "to")]
    pub to_entity: String,
    pub relation_type: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

impl RelationDraft {
    pub fn new(
        from_entity: impl Into<String>,
        relation_type: impl Into<String>,
        to_entity: impl Into<String>,
    ) -> Self {
        Self {
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            relation_type: relation_type.into(),
            strength: default_strength(),
            confidence: default_confidence(),
            metadata: default_metadata(),
        }
    }
}

impl From<ExtractedRelation> for RelationDraft {
    fn from(extracted: ExtractedRelation) -> Self {
        Self {
            from_entity: extracted.from_entity,
            to_entity: extracted.to_entity,
            relation_type: extracted.relation_type,
            strength: extracted.strength,
            confidence: default_confidence(),
            metadata: default_metadata(),
        }
    }
}

/// Input for storing a long-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDraft {
    pub content: String,
    #[serde(default = "default_memory_type")]
    pub memory_type: String,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default)]
    pub source_conversation_id: Option<ConversationId>,
}

impl MemoryDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type: default_memory_type(),
            importance: default_importance(),
            source_conversation_id: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = memory_type.into();
        self
    }
}

impl From<ExtractedMemory> for MemoryDraft {
    fn from(extracted: ExtractedMemory) -> Self {
        Self {
            content: extracted.content,
            memory_type: extracted.memory_type,
            importance: extracted.importance,
            source_conversation_id: None,
        }
    }
}

/// Entity hit from semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub entity: MemoryEntity,
    pub similarity: f32,
}

/// Long-term memory hit from semantic retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub memory: LongTermMemory,
    pub similarity: f32,
}

/// Relation rendered with resolved endpoint names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationTriple {
    pub from_name: String,
    pub relation_type: String,
    pub to_name: String,
    pub strength: f64,
}

/// Combined retrieval result assembled for prompt enhancement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    pub entities: Vec<EntityMatch>,
    pub memories: Vec<MemoryMatch>,
    pub relations: Vec<RelationTriple>,
    /// Number of matched entities plus matched memories.
    pub context_strength: usize,
}

/// Per-pass counts from conversation ingestion, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub entities_stored: usize,
    pub relations_stored: usize,
    pub memories_stored: usize,
    pub summary_stored: bool,
    /// Items dropped after a per-item failure.
    pub failures: usize,
}

fn default_confidence() -> f64 {
    1.0
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

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}
