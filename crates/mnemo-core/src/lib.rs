//! Orchestration layer for the mnemo memory subsystem.
//!
//! Owns the conversation log, the lazy engine lifecycle, and the
//! non-blocking bridge between the chat loop and the memory engine.

pub mod cell;
pub mod error;
pub mod log;
pub mod orchestrator;

/// Engine lifecycle cell and bootstrap factory type.
pub use cell::{EngineCell, EngineFactory};
/// Orchestration error type.
pub use error::CoreError;
/// JSONL conversation log implementation.
pub use log::JsonlConversationLog;
/// The orchestrator, its introspection summary, and the context renderer.
pub use orchestrator::{MemoryOrchestrator, MemorySummary, render_context};
