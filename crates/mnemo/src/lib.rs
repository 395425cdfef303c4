//! Public SDK surface for the mnemo memory subsystem.
//!
//! This crate re-exports the building blocks and provides a small
//! initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use mnemo_config as config;
pub use mnemo_core as core;
/// Re-export for convenience.
pub use mnemo_engine as engine;
/// Re-export for convenience.
pub use mnemo_protocol as protocol;

pub use mnemo_core::{MemoryOrchestrator, MemorySummary};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
