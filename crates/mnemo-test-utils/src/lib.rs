//! Test helpers shared across Mnemo crates.

pub mod embedding;
pub mod extraction;
pub mod log;

pub use embedding::{FailingEmbedding, FixedEmbedding, HashEmbedding};
pub use extraction::{FailingExtraction, FixedExtraction, RecordingExtraction};
pub use log::InMemoryConversationLog;
