use async_trait::async_trait;
use chrono::Utc;
use mnemo_protocol::{
    ConversationId, ConversationLog, ConversationRef, FunctionCall, LogError, LoggedMessage,
    MessageId, MessageRole,
};
use parking_lot::Mutex;
use uuid::Uuid;

struct Conversation {
    meta: ConversationRef,
    messages: Vec<LoggedMessage>,
}

/// In-memory conversation log for tests.
///
/// Matches the trait semantics of the production JSONL log: append order is
/// preserved and `get_or_create_conversation` resumes the owner's most recent
/// conversation on the same channel.
#[derive(Default)]
pub struct InMemoryConversationLog {
    conversations: Mutex<Vec<Conversation>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn get_or_create_conversation(
        &self,
        owner: &str,
        channel: &str,
    ) -> Result<ConversationId, LogError> {
        let mut conversations = self.conversations.lock();
        if let Some(existing) = conversations
            .iter()
            .rev()
            .find(|c| c.meta.owner == owner && c.meta.channel == channel)
        {
            return Ok(existing.meta.id);
        }
        let now = Utc::now();
        let meta = ConversationRef {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            channel: channel.to_string(),
            created_at: now,
            last_message_at: now,
        };
        let id = meta.id;
        conversations.push(Conversation {
            meta,
            messages: Vec::new(),
        });
        Ok(id)
    }

    async fn append(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: &str,
        function_call: Option<FunctionCall>,
    ) -> Result<MessageId, LogError> {
        let mut conversations = self.conversations.lock();
        let conversation = conversations
            .iter_mut()
            .find(|c| c.meta.id == conversation_id)
            .ok_or(LogError::UnknownConversation(conversation_id))?;
        let message = LoggedMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            function_call,
            created_at: Utc::now(),
        };
        let id = message.id;
        conversation.meta.last_message_at = message.created_at;
        conversation.messages.push(message);
        Ok(id)
    }

    async fn read(
        &self,
        conversation_id: ConversationId,
        limit: usize,
    ) -> Result<Vec<LoggedMessage>, LogError> {
        let conversations = self.conversations.lock();
        let conversation = conversations
            .iter()
            .find(|c| c.meta.id == conversation_id)
            .ok_or(LogError::UnknownConversation(conversation_id))?;
        let skip = conversation.messages.len().saturating_sub(limit);
        Ok(conversation.messages[skip..].to_vec())
    }

    async fn read_all_for_owner(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<(ConversationRef, LoggedMessage)>, LogError> {
        let conversations = self.conversations.lock();
        let mut out = Vec::new();
        let mut owned: Vec<&Conversation> = conversations
            .iter()
            .filter(|c| c.meta.owner == owner)
            .collect();
        owned.sort_by(|a, b| b.meta.last_message_at.cmp(&a.meta.last_message_at));
        for conversation in owned {
            for message in &conversation.messages {
                if out.len() >= limit {
                    return Ok(out);
                }
                out.push((conversation.meta.clone(), message.clone()));
            }
        }
        Ok(out)
    }

    async fn count(&self, conversation_id: ConversationId) -> Result<usize, LogError> {
        let conversations = self.conversations.lock();
        let conversation = conversations
            .iter()
            .find(|c| c.meta.id == conversation_id)
            .ok_or(LogError::UnknownConversation(conversation_id))?;
        Ok(conversation.messages.len())
    }
}
