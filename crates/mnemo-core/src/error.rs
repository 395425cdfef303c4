//! Error types for the orchestration layer.

use mnemo_engine::EngineError;
use mnemo_protocol::LogError;

/// Errors surfaced by the orchestrator.
///
/// Most engine-side failures are absorbed and logged; what remains here is
/// the conversation log (system of record) and the compliance erasure path.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Conversation log failure.
    #[error("conversation log error: {0}")]
    Log(#[from] LogError),
    /// Engine failure on a path that must not degrade.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    /// The engine could not be bootstrapped.
    #[error("memory engine unavailable: {0}")]
    EngineUnavailable(String),
}
