//! The memory engine: persistence and retrieval over the three substores.

use crate::error::EngineError;
use crate::model::{
    ConversationContext, ConversationSummary, EntityDraft, EntityMatch, GlobalMemoryStats,
    IngestReport, LongTermMemory, MemoryDraft, MemoryEntity, MemoryMatch, MemoryRelation,
    MemoryStats, RelationDraft,
};
use crate::store::MemoryStore;
use crate::vector::cosine_similarity;
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use mnemo_protocol::{
    ConversationId, ConversationLog, ConversationInsights, EmbeddingProvider, ExtractionProvider,
};
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Default entity search breadth for context assembly.
pub const ENTITY_SEARCH_LIMIT: usize = 5;
/// Default entity similarity floor for context assembly.
pub const ENTITY_MIN_SIMILARITY: f32 = 0.6;
/// Default memory retrieval breadth for context assembly.
pub const MEMORY_SEARCH_LIMIT: usize = 3;
/// Default memory similarity floor for context assembly.
pub const MEMORY_MIN_SIMILARITY: f32 = 0.5;
/// Relations are pulled for this many of the top entity matches.
const RELATION_ENTITY_SPAN: usize = 3;
/// Outgoing relations fetched per entity, strongest first.
const RELATIONS_PER_ENTITY: usize = 3;
/// Memories at or above this importance survive retention cleanup
/// regardless of age and access count.
const CLEANUP_IMPORTANCE_FLOOR: f64 = 0.3;

/// Engine over the structured substores.
///
/// Owns the SQLite store plus handles to the embedding service, the
/// extraction service, and the external conversation log. Retrieval paths
/// degrade to empty results on provider failure; only compliance erasure
/// surfaces errors to callers on the conversational path.
pub struct MemoryEngine {
    store: MemoryStore,
    embedding: Arc<dyn EmbeddingProvider>,
    extraction: Arc<dyn ExtractionProvider>,
    log: Arc<dyn ConversationLog>,
}

impl MemoryEngine {
    pub fn new(
        store: MemoryStore,
        embedding: Arc<dyn EmbeddingProvider>,
        extraction: Arc<dyn ExtractionProvider>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        Self {
            store,
            embedding,
            extraction,
            log,
        }
    }

    /// Create an entity in the owner's graph and return its id.
    ///
    /// The embedded text is the name, type, and observations concatenated,
    /// so searches match on any of the three. No deduplication: repeated
    /// extraction of the same real-world entity produces parallel rows.
    pub async fn create_entity(
        &self,
        draft: EntityDraft,
        owner: &str,
    ) -> Result<Uuid, EngineError> {
        let text =
            MemoryEntity::embedding_text(&draft.name, &draft.entity_type, &draft.observations);
        let vector = self.embedding.embed(&text).await?;
        let now = Utc::now();
        let entity = MemoryEntity {
            id: Uuid::new_v4(),
            name: draft.name,
            entity_type: draft.entity_type,
            observations: draft.observations,
            confidence: draft.confidence,
            created_at: now,
            last_updated: now,
            metadata: draft.metadata,
            owner: owner.to_string(),
        };
        self.store.insert_entity(&entity, &vector)?;
        info!(
            "created entity (owner={}, id={}, name={})",
            owner, entity.id, entity.name
        );
        Ok(entity.id)
    }

    /// Create a relation between two named entities in the owner's graph.
    ///
    /// Endpoint names are resolved within the owner; when either endpoint is
    /// missing the relation is skipped with a warning and the call still
    /// succeeds, so one dangling edge never aborts an extraction pass.
    pub async fn create_relation(
        &self,
        draft: RelationDraft,
        owner: &str,
    ) -> Result<(), EngineError> {
        let from = self.store.resolve_entity_id(&draft.from_entity, owner)?;
        let to = self.store.resolve_entity_id(&draft.to_entity, owner)?;
        let (Some(from_entity_id), Some(to_entity_id)) = (from, to) else {
            warn!(
                "skipping relation with unresolved endpoint (owner={}, from={}, to={})",
                owner, draft.from_entity, draft.to_entity
            );
            return Ok(());
        };
        let relation = MemoryRelation {
            id: Uuid::new_v4(),
            from_entity_id,
            to_entity_id,
            relation_type: draft.relation_type,
            strength: draft.strength,
            confidence: draft.confidence,
            created_at: Utc::now(),
            metadata: draft.metadata,
        };
        self.store.insert_relation(&relation)?;
        debug!(
            "created relation (owner={}, id={}, type={})",
            owner, relation.id, relation.relation_type
        );
        Ok(())
    }

    /// Search the owner's entities by semantic similarity.
    ///
    /// Embedding or store failure degrades to an empty result set.
    pub async fn semantic_search_entities(
        &self,
        query: &str,
        owner: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Vec<EntityMatch> {
        let query_vector = match self.embedding.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("entity search degraded to empty (owner={}): {}", owner, e);
                return Vec::new();
            }
        };
        let rows = match self.store.entities_for_owner(owner) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("entity search degraded to empty (owner={}): {}", owner, e);
                return Vec::new();
            }
        };
        let mut matches: Vec<EntityMatch> = rows
            .into_iter()
            .filter_map(|(entity, vector)| {
                let similarity = cosine_similarity(&query_vector, &vector);
                (similarity >= min_similarity).then_some(EntityMatch { entity, similarity })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        matches.truncate(limit);
        matches
    }

    /// Store a long-term memory for an owner.
    pub async fn store_long_term_memory(
        &self,
        draft: MemoryDraft,
        owner: &str,
    ) -> Result<(), EngineError> {
        let vector = self.embedding.embed(&draft.content).await?;
        let now = Utc::now();
        let memory = LongTermMemory {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            content: draft.content,
            memory_type: draft.memory_type,
            importance_score: draft.importance,
            access_count: 0,
            last_accessed: now,
            created_at: now,
            source_conversation_id: draft.source_conversation_id,
        };
        self.store.insert_memory(&memory, &vector)?;
        info!(
            "stored long-term memory (owner={}, id={}, type={})",
            owner, memory.id, memory.memory_type
        );
        Ok(())
    }

    /// Retrieve the owner's long-term memories for a query.
    ///
    /// Results pass the similarity floor, then rank by importance first,
    /// similarity second, access count third. Every returned memory has its
    /// access count bumped and `last_accessed` refreshed, so retrieval
    /// itself reinforces frequently useful memories. Embedding or store
    /// failure degrades to an empty result set.
    pub async fn retrieve_long_term_memories(
        &self,
        query: &str,
        owner: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Vec<MemoryMatch> {
        let query_vector = match self.embedding.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("memory retrieval degraded to empty (owner={}): {}", owner, e);
                return Vec::new();
            }
        };
        let rows = match self.store.memories_for_owner(owner) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("memory retrieval degraded to empty (owner={}): {}", owner, e);
                return Vec::new();
            }
        };
        let mut matches: Vec<MemoryMatch> = rows
            .into_iter()
            .filter_map(|(memory, vector)| {
                let similarity = cosine_similarity(&query_vector, &vector);
                (similarity >= min_similarity).then_some(MemoryMatch { memory, similarity })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.memory
                .importance_score
                .partial_cmp(&a.memory.importance_score)
                .unwrap_or(Ordering::Equal)
                .then(
                    b.similarity
                        .partial_cmp(&a.similarity)
                        .unwrap_or(Ordering::Equal),
                )
                .then(b.memory.access_count.cmp(&a.memory.access_count))
        });
        matches.truncate(limit);

        let ids: Vec<Uuid> = matches.iter().map(|m| m.memory.id).collect();
        if !ids.is_empty() {
            if let Err(e) = self.store.record_memory_access(&ids, Utc::now()) {
                warn!("failed to record memory access (owner={}): {}", owner, e);
            }
        }
        matches
    }

    /// Run insight extraction over a conversation's transcript.
    ///
    /// An empty transcript, an unreadable log, or a failed extraction all
    /// yield empty insights rather than an error.
    pub async fn extract_conversation_insights(
        &self,
        conversation_id: ConversationId,
        owner: &str,
    ) -> ConversationInsights {
        let messages = match self.log.read(conversation_id, usize::MAX).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    "extraction skipped, log unreadable (conversation={}): {}",
                    conversation_id, e
                );
                return ConversationInsights::default();
            }
        };
        if messages.is_empty() {
            return ConversationInsights::default();
        }
        let mut lines = Vec::with_capacity(messages.len());
        for message in &messages {
            lines.push(format!("{}: {}", message.role.as_str(), message.content));
            if let Some(call) = &message.function_call {
                lines.push(format!("[function: {}]", call.name));
            }
        }
        let transcript = lines.join("\n");
        match self.extraction.extract(&transcript).await {
            Ok(insights) => insights,
            Err(e) => {
                warn!(
                    "extraction failed, continuing without insights (conversation={}, owner={}): {}",
                    conversation_id, owner, e
                );
                ConversationInsights::default()
            }
        }
    }

    /// Extract insights from a conversation and persist them best-effort.
    ///
    /// Entities land first so relation endpoints can resolve. Each item is
    /// stored independently; one failure is logged and counted, never
    /// aborting the pass. A non-blank summary is embedded and stored with
    /// the extracted entity names as its key entities.
    pub async fn process_conversation_memory(
        &self,
        conversation_id: ConversationId,
        owner: &str,
    ) -> IngestReport {
        let insights = self
            .extract_conversation_insights(conversation_id, owner)
            .await;
        let mut report = IngestReport::default();
        if insights.is_empty() {
            debug!(
                "no insights to persist (conversation={}, owner={})",
                conversation_id, owner
            );
            return report;
        }

        let key_entities: Vec<String> =
            insights.entities.iter().map(|e| e.name.clone()).collect();

        for extracted in insights.entities {
            let name = extracted.name.clone();
            match self.create_entity(extracted.into(), owner).await {
                Ok(_) => report.entities_stored += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!("failed to store extracted entity (name={}): {}", name, e);
                }
            }
        }
        for extracted in insights.relations {
            match self.create_relation(extracted.into(), owner).await {
                Ok(()) => report.relations_stored += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!("failed to store extracted relation: {}", e);
                }
            }
        }
        for extracted in insights.long_term_memories {
            let mut draft: MemoryDraft = extracted.into();
            draft.source_conversation_id = Some(conversation_id);
            match self.store_long_term_memory(draft, owner).await {
                Ok(()) => report.memories_stored += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!("failed to store extracted memory: {}", e);
                }
            }
        }
        if let Some(summary_text) = insights.summary
            && !summary_text.trim().is_empty()
        {
            match self
                .store_summary(conversation_id, owner, summary_text, key_entities)
                .await
            {
                Ok(()) => report.summary_stored = true,
                Err(e) => {
                    report.failures += 1;
                    warn!("failed to store conversation summary: {}", e);
                }
            }
        }

        info!(
            "processed conversation memory (conversation={}, owner={}, entities={}, relations={}, memories={}, summary={}, failures={})",
            conversation_id,
            owner,
            report.entities_stored,
            report.relations_stored,
            report.memories_stored,
            report.summary_stored,
            report.failures
        );
        report
    }

    async fn store_summary(
        &self,
        conversation_id: ConversationId,
        owner: &str,
        summary_text: String,
        key_entities: Vec<String>,
    ) -> Result<(), EngineError> {
        let vector = self.embedding.embed(&summary_text).await?;
        let summary = ConversationSummary {
            id: Uuid::new_v4(),
            conversation_id,
            summary_text,
            key_entities,
            created_at: Utc::now(),
            owner: owner.to_string(),
        };
        self.store.insert_summary(&summary, &vector)?;
        Ok(())
    }

    /// Assemble the combined retrieval context for a query.
    ///
    /// Top entities and memories at their default floors, plus the
    /// strongest outgoing relations of the leading entity matches.
    pub async fn get_conversation_context(&self, query: &str, owner: &str) -> ConversationContext {
        let entities = self
            .semantic_search_entities(query, owner, ENTITY_SEARCH_LIMIT, ENTITY_MIN_SIMILARITY)
            .await;
        let memories = self
            .retrieve_long_term_memories(query, owner, MEMORY_SEARCH_LIMIT, MEMORY_MIN_SIMILARITY)
            .await;
        let mut relations = Vec::new();
        for matched in entities.iter().take(RELATION_ENTITY_SPAN) {
            match self
                .store
                .relations_from(matched.entity.id, RELATIONS_PER_ENTITY)
            {
                Ok(mut triples) => relations.append(&mut triples),
                Err(e) => warn!(
                    "skipping relations for entity (id={}): {}",
                    matched.entity.id, e
                ),
            }
        }
        let context_strength = entities.len() + memories.len();
        ConversationContext {
            entities,
            memories,
            relations,
            context_strength,
        }
    }

    /// Delete stale low-value memories and return the number removed.
    ///
    /// Conditions are conjunctive: older than the age threshold, accessed
    /// fewer than `min_access_count` times, and below the fixed importance
    /// floor. Entities, relations, and summaries are untouched.
    pub fn cleanup_old_memories(
        &self,
        max_age: Duration,
        min_access_count: i64,
    ) -> Result<usize, EngineError> {
        let cutoff = Utc::now() - max_age;
        let removed =
            self.store
                .cleanup_memories(cutoff, min_access_count, CLEANUP_IMPORTANCE_FLOOR)?;
        if removed > 0 {
            info!("cleaned up stale memories (removed={})", removed);
        }
        Ok(removed)
    }

    /// Per-owner record counts across the substores.
    pub fn get_memory_stats(&self, owner: &str) -> Result<MemoryStats, EngineError> {
        self.store.stats(owner)
    }

    /// Record counts over all owners, plus the distinct owner count.
    pub fn get_global_stats(&self) -> Result<GlobalMemoryStats, EngineError> {
        self.store.global_stats()
    }

    /// Remove every stored trace of an owner: relations touching their
    /// entities, then entities, memories, and summaries. Errors propagate;
    /// this is the one path that must not silently degrade. Idempotent.
    pub fn delete_owner_data(&self, owner: &str) -> Result<(), EngineError> {
        self.store.delete_owner(owner)?;
        info!("deleted all memory data (owner={})", owner);
        Ok(())
    }
}
