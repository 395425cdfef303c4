use async_trait::async_trait;
use mnemo_protocol::{ConversationInsights, ExtractionError, ExtractionProvider};
use parking_lot::Mutex;
use std::sync::Arc;

/// Extraction provider that returns the same insights for every transcript.
#[derive(Debug, Clone, Default)]
pub struct FixedExtraction {
    insights: ConversationInsights,
}

impl FixedExtraction {
    pub fn new(insights: ConversationInsights) -> Self {
        Self { insights }
    }

    /// Provider that extracts nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExtractionProvider for FixedExtraction {
    async fn extract(&self, _transcript: &str) -> Result<ConversationInsights, ExtractionError> {
        Ok(self.insights.clone())
    }
}

/// Extraction provider that records the transcripts it was handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingExtraction {
    insights: ConversationInsights,
    transcripts: Arc<Mutex<Vec<String>>>,
}

impl RecordingExtraction {
    pub fn new(insights: ConversationInsights) -> Self {
        Self {
            insights,
            transcripts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Transcripts seen so far, oldest first.
    pub fn transcripts(&self) -> Vec<String> {
        self.transcripts.lock().clone()
    }

    /// Number of extraction calls so far.
    pub fn call_count(&self) -> usize {
        self.transcripts.lock().len()
    }
}

#[async_trait]
impl ExtractionProvider for RecordingExtraction {
    async fn extract(&self, transcript: &str) -> Result<ConversationInsights, ExtractionError> {
        self.transcripts.lock().push(transcript.to_string());
        Ok(self.insights.clone())
    }
}

/// Extraction provider that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingExtraction;

impl FailingExtraction {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtractionProvider for FailingExtraction {
    async fn extract(&self, _transcript: &str) -> Result<ConversationInsights, ExtractionError> {
        Err(ExtractionError::Request(
            "extraction stub failure".to_string(),
        ))
    }
}
