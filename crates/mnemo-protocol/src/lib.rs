//! Shared contracts for the mnemo memory subsystem.
//!
//! This crate owns the interface boundaries to external collaborators: the
//! append-only conversation log, the embedding service, and the extraction
//! service. The engine and orchestrator crates depend on these traits, never
//! on a concrete transport.

mod embedding;
mod extraction;
mod log;

/// Embedding provider trait and error type.
pub use embedding::{EmbeddingError, EmbeddingProvider};
/// Extraction provider trait, wire schema, and error type.
pub use extraction::{
    ConversationInsights, ExtractedEntity, ExtractedMemory, ExtractedRelation, ExtractionError,
    ExtractionProvider,
};
/// Conversation log trait and message records.
pub use log::{ConversationLog, ConversationRef, FunctionCall, LogError, LoggedMessage, MessageRole};

use uuid::Uuid;

/// Unique identifier for a conversation in the external log.
pub type ConversationId = Uuid;
/// Unique identifier for a logged message.
pub type MessageId = Uuid;
