//! Configuration schema for mnemo.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root config for the mnemo memory subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemoConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub conversation_log: ConversationLogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl MnemoConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemoConfigBuilder {
        MnemoConfigBuilder::new()
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.process_every == 0 {
            return Err(ConfigError::InvalidField {
                path: "orchestrator.process_every".to_string(),
                message: "cadence must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.orchestrator.summary_min_similarity) {
            return Err(ConfigError::InvalidField {
                path: "orchestrator.summary_min_similarity".to_string(),
                message: "similarity floor must be within [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for assembling a `MnemoConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemoConfigBuilder {
    config: MnemoConfig,
}

impl MnemoConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemoConfig::default(),
        }
    }

    /// Replace the structured-store configuration.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Replace the conversation-log configuration.
    pub fn conversation_log(mut self, log: ConversationLogConfig) -> Self {
        self.config.conversation_log = log;
        self
    }

    /// Replace the embedding service configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the extraction service configuration.
    pub fn extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.config.extraction = extraction;
        self
    }

    /// Replace the orchestrator configuration.
    pub fn orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.config.orchestrator = orchestrator;
        self
    }

    /// Replace the retention configuration.
    pub fn retention(mut self, retention: RetentionConfig) -> Self {
        self.config.retention = retention;
        self
    }

    /// Replace the management server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Finalize and return the built `MnemoConfig`.
    pub fn build(self) -> MnemoConfig {
        self.config
    }
}

/// SQLite store configuration for the structured substores.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Database file path. Relative paths resolve against the data root;
    /// absent means `<data root>/memory.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// JSONL conversation log configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationLogConfig {
    /// Root directory for conversation files; absent means
    /// `<data root>/conversations`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Embedding service endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

/// Extraction service (chat-completions) endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the OpenAI-compatible extraction service.
    #[serde(default = "default_extraction_base_url")]
    pub base_url: String,
    /// Generative model used for insight extraction.
    #[serde(default = "default_extraction_model")]
    pub model: String,
    /// Optional bearer token for the extraction service.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sampling temperature; kept low for low-variance structured output.
    #[serde(default = "default_extraction_temperature")]
    pub temperature: f64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: default_extraction_base_url(),
            model: default_extraction_model(),
            api_key: None,
            temperature: default_extraction_temperature(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

/// Orchestrator cadence and context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Dispatch background extraction every N logged messages.
    #[serde(default = "default_process_every")]
    pub process_every: usize,
    /// Content substrings that trigger immediate extraction dispatch.
    #[serde(default = "default_termination_cues")]
    pub termination_cues: Vec<String>,
    /// Similarity floor used by the introspection summary, deliberately low
    /// so debug queries still surface something.
    #[serde(default = "default_summary_min_similarity")]
    pub summary_min_similarity: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            process_every: default_process_every(),
            termination_cues: default_termination_cues(),
            summary_min_similarity: default_summary_min_similarity(),
        }
    }
}

/// Retention cleanup thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Memories older than this many days become cleanup candidates.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// Memories at or above this access count are never cleaned up.
    #[serde(default = "default_min_access_count")]
    pub min_access_count: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            min_access_count: default_min_access_count(),
        }
    }
}

/// Management API bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the management API.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_extraction_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_extraction_temperature() -> f64 {
    0.1
}

fn default_extraction_timeout_secs() -> u64 {
    60
}

fn default_process_every() -> usize {
    5
}

fn default_termination_cues() -> Vec<String> {
    vec!["goodbye".to_string()]
}

fn default_summary_min_similarity() -> f64 {
    0.1
}

fn default_max_age_days() -> u32 {
    90
}

fn default_min_access_count() -> u32 {
    1
}

fn default_bind() -> String {
    "127.0.0.1:8750".to_string()
}

/// Resolve the data root used for relative and defaulted storage paths.
pub fn data_root() -> PathBuf {
    if let Some(dirs) = directories::BaseDirs::new() {
        return dirs.home_dir().join(".mnemo");
    }
    PathBuf::from(".mnemo")
}
