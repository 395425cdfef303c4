//! Lazy engine lifecycle.
//!
//! The engine starts uninitialized and is bootstrapped on first use. A
//! failed bootstrap leaves the cell empty so the next call retries; there is
//! no degraded terminal state. Callers that get `None` simply operate
//! without memory for that turn.

use log::{info, warn};
use mnemo_engine::{EngineError, MemoryEngine};
use parking_lot::RwLock;
use std::sync::Arc;

/// Factory invoked to bootstrap the engine on first use.
pub type EngineFactory = Box<dyn Fn() -> Result<MemoryEngine, EngineError> + Send + Sync>;

/// Holder for the lazily bootstrapped engine.
pub struct EngineCell {
    factory: EngineFactory,
    slot: RwLock<Option<Arc<MemoryEngine>>>,
}

impl EngineCell {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            slot: RwLock::new(None),
        }
    }

    /// Cell seeded with an already-built engine; bootstrap never runs.
    pub fn preloaded(engine: MemoryEngine) -> Self {
        Self {
            factory: Box::new(|| {
                Err(EngineError::Io(std::io::Error::other(
                    "engine was preloaded",
                )))
            }),
            slot: RwLock::new(Some(Arc::new(engine))),
        }
    }

    /// The ready engine, bootstrapping it first if necessary.
    ///
    /// Returns `None` when bootstrap fails; the failure is logged and the
    /// next call tries again.
    pub fn engine(&self) -> Option<Arc<MemoryEngine>> {
        if let Some(engine) = self.slot.read().clone() {
            return Some(engine);
        }
        let mut slot = self.slot.write();
        if let Some(engine) = slot.clone() {
            return Some(engine);
        }
        match (self.factory)() {
            Ok(engine) => {
                let engine = Arc::new(engine);
                *slot = Some(engine.clone());
                info!("memory engine ready");
                Some(engine)
            }
            Err(e) => {
                warn!("memory engine bootstrap failed, will retry on next use: {}", e);
                None
            }
        }
    }

    /// Whether the engine has been bootstrapped.
    pub fn is_ready(&self) -> bool {
        self.slot.read().is_some()
    }
}
