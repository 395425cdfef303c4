//! Conversation log contract.
//!
//! The log is the system of record for raw turns. The memory subsystem only
//! appends and reads; it never mutates or deletes log content.

use crate::{ConversationId, MessageId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// End-user turn.
    User,
    /// Assistant turn.
    Assistant,
    /// System or operator injection.
    System,
}

impl MessageRole {
    /// Stable string form used in transcripts and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// Function execution recorded alongside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Executed function name.
    pub name: String,
    /// Input parameters as passed to the function.
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
    /// Function output, if captured.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// A single message read back from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
    /// Optional function execution annotation.
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
    /// Append timestamp.
    pub created_at: DateTime<Utc>,
}

/// Conversation-level record for owner lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRef {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Owner the conversation belongs to.
    pub owner: String,
    /// Originating channel tag (webchat, sms, voice, ...).
    pub channel: String,
    /// Conversation creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent message.
    pub last_message_at: DateTime<Utc>,
}

/// Errors returned by conversation log implementations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Conversation id is unknown to the log.
    #[error("unknown conversation: {0}")]
    UnknownConversation(ConversationId),
}

/// Append-only conversation log consumed by the memory subsystem.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Resume the most recent conversation for an owner on a channel, or
    /// create a new one.
    async fn get_or_create_conversation(
        &self,
        owner: &str,
        channel: &str,
    ) -> Result<ConversationId, LogError>;

    /// Append a message and return its id.
    async fn append(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: &str,
        function_call: Option<FunctionCall>,
    ) -> Result<MessageId, LogError>;

    /// Read messages for a conversation in append order, up to `limit`.
    async fn read(
        &self,
        conversation_id: ConversationId,
        limit: usize,
    ) -> Result<Vec<LoggedMessage>, LogError>;

    /// Read messages across all of an owner's conversations, newest
    /// conversations first, up to `limit` messages total.
    async fn read_all_for_owner(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<(ConversationRef, LoggedMessage)>, LogError>;

    /// Count messages currently logged for a conversation.
    async fn count(&self, conversation_id: ConversationId) -> Result<usize, LogError>;
}
