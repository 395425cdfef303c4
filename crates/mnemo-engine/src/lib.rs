//! Memory engine for the mnemo subsystem.
//!
//! SQLite-backed entity graph, long-term semantic memory, and conversation
//! summaries, with cosine-similarity retrieval and model-driven insight
//! extraction.

pub mod embedding;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod model;
pub mod store;
pub mod vector;

/// The memory engine and its retrieval defaults.
pub use engine::{
    ENTITY_MIN_SIMILARITY, ENTITY_SEARCH_LIMIT, MEMORY_MIN_SIMILARITY, MEMORY_SEARCH_LIMIT,
    MemoryEngine,
};
/// Engine error type.
pub use error::EngineError;
/// Record models, drafts, and retrieval results.
pub use model::{
    ConversationContext, ConversationSummary, EntityDraft, EntityMatch, GlobalMemoryStats,
    IngestReport, LongTermMemory, MemoryDraft, MemoryEntity, MemoryMatch, MemoryRelation,
    MemoryStats, RelationDraft, RelationTriple,
};
/// SQLite store.
pub use store::MemoryStore;
/// HTTP provider implementations.
pub use embedding::HttpEmbeddingClient;
pub use extraction::HttpExtractionClient;
