//! Conversation-facing orchestration over the memory engine.
//!
//! The orchestrator sits between the chat loop and the engine: it appends
//! every turn to the conversation log, dispatches background extraction at
//! the configured cadence, and renders retrieval results into a context
//! string. The chat loop never waits on memory work and never sees an
//! engine failure.

use crate::cell::EngineCell;
use crate::error::CoreError;
use crate::log::JsonlConversationLog;
use log::{debug, warn};
use mnemo_config::{MnemoConfig, OrchestratorConfig, data_root};
use mnemo_engine::{
    ConversationContext, EntityMatch, HttpEmbeddingClient, HttpExtractionClient, MemoryEngine,
    MemoryMatch, MemoryStats, MemoryStore,
};
use mnemo_protocol::{ConversationId, ConversationLog, FunctionCall, MessageId, MessageRole};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Entities rendered into the context string.
const CONTEXT_ENTITY_SPAN: usize = 3;
/// Relations rendered into the context string.
const CONTEXT_RELATION_SPAN: usize = 3;
/// Entity and memory breadth for the introspection summary.
const SUMMARY_LIMIT: usize = 5;

const CONTEXT_SUFFIX: &str =
    "Use this context to provide more personalized and relevant responses.\n";

/// Introspection snapshot of what the system remembers about an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    /// False when the engine is not bootstrapped.
    pub ready: bool,
    /// Record counts across the substores.
    pub stats: MemoryStats,
    /// Entities matching a broad recency probe.
    pub recent_entities: Vec<EntityMatch>,
    /// Memories matching a broad importance probe.
    pub important_memories: Vec<MemoryMatch>,
}

impl MemorySummary {
    /// Summary reported while the engine is unavailable.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            stats: MemoryStats::default(),
            recent_entities: Vec::new(),
            important_memories: Vec::new(),
        }
    }
}

/// Orchestrator owning the conversation log and the engine lifecycle.
pub struct MemoryOrchestrator {
    log: Arc<dyn ConversationLog>,
    cell: EngineCell,
    config: OrchestratorConfig,
    /// Conversations with an extraction pass currently running.
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
}

impl MemoryOrchestrator {
    pub fn new(log: Arc<dyn ConversationLog>, cell: EngineCell, config: OrchestratorConfig) -> Self {
        Self {
            log,
            cell,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Build the full production wiring from config: JSONL log on disk plus
    /// a lazy engine over SQLite and the HTTP providers.
    pub fn from_config(config: &MnemoConfig) -> Result<Self, CoreError> {
        let root = data_root();
        let log_root = resolve_path(&config.conversation_log.path, &root, "conversations");
        let log = Arc::new(JsonlConversationLog::new(log_root)?);

        let store_path = resolve_path(&config.store.path, &root, "memory.db");
        let embedding_config = config.embedding.clone();
        let extraction_config = config.extraction.clone();
        let engine_log: Arc<dyn ConversationLog> = log.clone();
        let cell = EngineCell::new(Box::new(move || {
            let store = MemoryStore::open(&store_path)?;
            let embedding = HttpEmbeddingClient::new(&embedding_config)?;
            let extraction = HttpExtractionClient::new(&extraction_config)?;
            Ok(MemoryEngine::new(
                store,
                Arc::new(embedding),
                Arc::new(extraction),
                engine_log.clone(),
            ))
        }));

        Ok(Self::new(log, cell, config.orchestrator.clone()))
    }

    /// The conversation log this orchestrator appends to.
    pub fn conversation_log(&self) -> &Arc<dyn ConversationLog> {
        &self.log
    }

    /// The engine, bootstrapping it if necessary.
    pub fn engine(&self) -> Option<Arc<MemoryEngine>> {
        self.cell.engine()
    }

    /// Whether the engine has been bootstrapped.
    pub fn is_ready(&self) -> bool {
        self.cell.is_ready()
    }

    /// Resume or start a conversation for an owner on a channel.
    pub async fn start_conversation(
        &self,
        owner: &str,
        channel: &str,
    ) -> Result<ConversationId, CoreError> {
        Ok(self.log.get_or_create_conversation(owner, channel).await?)
    }

    /// Append a turn to the log and, at the configured cadence, dispatch a
    /// background extraction pass.
    ///
    /// The append is the system of record and its failure is an error.
    /// Everything after it is best-effort: a missing engine, an unreadable
    /// count, or an already-running pass for this conversation all leave
    /// the message saved and the chat loop unblocked.
    pub async fn save_message_with_enhancement(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: &str,
        owner: &str,
        function_call: Option<FunctionCall>,
    ) -> Result<MessageId, CoreError> {
        let message_id = self
            .log
            .append(conversation_id, role, content, function_call)
            .await?;

        let Some(engine) = self.cell.engine() else {
            return Ok(message_id);
        };
        let count = match self.log.count(conversation_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    "skipping extraction dispatch, count unavailable (conversation={}): {}",
                    conversation_id, e
                );
                return Ok(message_id);
            }
        };

        let lowered = content.to_lowercase();
        let cued = self
            .config
            .termination_cues
            .iter()
            .any(|cue| lowered.contains(&cue.to_lowercase()));
        if count % self.config.process_every != 0 && !cued {
            return Ok(message_id);
        }

        // One extraction pass per conversation at a time; a pass that is
        // still running swallows this trigger rather than queueing another.
        if !self.in_flight.lock().insert(conversation_id) {
            debug!(
                "extraction already in flight, skipping dispatch (conversation={})",
                conversation_id
            );
            return Ok(message_id);
        }
        debug!(
            "dispatching extraction (conversation={}, count={}, cued={})",
            conversation_id, count, cued
        );
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            conversation_id,
        };
        let owner = owner.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            engine.process_conversation_memory(conversation_id, &owner).await;
        });

        Ok(message_id)
    }

    /// Render retrieval results for a query into a prompt-ready context
    /// string. Returns the empty string when nothing matched or the engine
    /// is unavailable.
    pub async fn get_enhanced_context(&self, query: &str, owner: &str) -> String {
        let Some(engine) = self.cell.engine() else {
            return String::new();
        };
        let context = engine.get_conversation_context(query, owner).await;
        render_context(&context)
    }

    /// Snapshot what the system remembers about an owner.
    ///
    /// Uses deliberately broad probes at a low similarity floor so the
    /// introspection view surfaces something even for sparse owners.
    pub async fn get_memory_summary_for_user(&self, owner: &str) -> MemorySummary {
        let Some(engine) = self.cell.engine() else {
            return MemorySummary::not_ready();
        };
        let stats = match engine.get_memory_stats(owner) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("memory summary unavailable (owner={}): {}", owner, e);
                return MemorySummary::not_ready();
            }
        };
        let floor = self.config.summary_min_similarity as f32;
        let recent_entities = engine
            .semantic_search_entities("recent customer information", owner, SUMMARY_LIMIT, floor)
            .await;
        let important_memories = engine
            .retrieve_long_term_memories("important preferences facts", owner, SUMMARY_LIMIT, floor)
            .await;
        MemorySummary {
            ready: true,
            stats,
            recent_entities,
            important_memories,
        }
    }

    /// Erase everything stored about an owner.
    ///
    /// Unlike the conversational paths this one surfaces failure: an
    /// unavailable engine or a store error must reach the caller.
    pub async fn forget_user_data(&self, owner: &str) -> Result<(), CoreError> {
        let engine = self.cell.engine().ok_or_else(|| {
            CoreError::EngineUnavailable("bootstrap failed during erasure".to_string())
        })?;
        engine.delete_owner_data(owner)?;
        Ok(())
    }
}

/// Releases a conversation's extraction slot when the pass ends, however it
/// ends. A panicking provider must not pin the conversation in the
/// in-flight set forever.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
    conversation_id: ConversationId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.conversation_id);
    }
}

/// Render an assembled context into the prompt-ready string.
///
/// Up to three sections (entity observations, memory contents with
/// importance, relation triples) joined by blank lines, followed by a fixed
/// instruction suffix. Zero strength renders to the empty string, the
/// explicit "nothing to add" signal.
pub fn render_context(context: &ConversationContext) -> String {
    if context.context_strength == 0 {
        return String::new();
    }

    let mut parts = Vec::new();
    if !context.entities.is_empty() {
        let mut section = String::from("Relevant context about the user:\n");
        for matched in context.entities.iter().take(CONTEXT_ENTITY_SPAN) {
            section.push_str(&format!(
                "- {} ({}): {}\n",
                matched.entity.name,
                matched.entity.entity_type,
                matched.entity.observations.join(", ")
            ));
        }
        parts.push(section);
    }
    if !context.memories.is_empty() {
        let mut section = String::from("Important things to remember:\n");
        for matched in &context.memories {
            section.push_str(&format!(
                "- {} (importance: {:.1})\n",
                matched.memory.content, matched.memory.importance_score
            ));
        }
        parts.push(section);
    }
    if !context.relations.is_empty() {
        let mut section = String::from("Relevant relationships:\n");
        for relation in context.relations.iter().take(CONTEXT_RELATION_SPAN) {
            section.push_str(&format!(
                "- {} {} {}\n",
                relation.from_name, relation.relation_type, relation.to_name
            ));
        }
        parts.push(section);
    }

    format!("{}\n\n{}", parts.join("\n\n"), CONTEXT_SUFFIX)
}

fn resolve_path(configured: &Option<PathBuf>, root: &PathBuf, default_leaf: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => root.join(path),
        None => root.join(default_leaf),
    }
}
