//! JSONL-backed conversation log.
//!
//! One append-only rollout file per conversation under a root directory.
//! Each file starts with a schema-version event and a creation event; every
//! message is one JSON line after that. Reads replay the file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use mnemo_protocol::{
    ConversationId, ConversationLog, ConversationRef, FunctionCall, LogError, LoggedMessage,
    MessageId, MessageRole,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SCHEMA_VERSION: u32 = 1;

/// Internal JSONL event representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RolloutEvent {
    SchemaVersion {
        version: u32,
    },
    ConversationCreated {
        conversation_id: ConversationId,
        owner: String,
        channel: String,
        created_at: DateTime<Utc>,
    },
    Message {
        message_id: MessageId,
        role: MessageRole,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionCall>,
        created_at: DateTime<Utc>,
    },
}

#[derive(Default)]
struct Rollout {
    meta: Option<ConversationRef>,
    messages: Vec<LoggedMessage>,
}

impl Rollout {
    fn apply(&mut self, conversation_id: ConversationId, event: RolloutEvent) {
        match event {
            RolloutEvent::SchemaVersion { .. } => {}
            RolloutEvent::ConversationCreated {
                owner,
                channel,
                created_at,
                ..
            } => {
                self.meta = Some(ConversationRef {
                    id: conversation_id,
                    owner,
                    channel,
                    created_at,
                    last_message_at: created_at,
                });
            }
            RolloutEvent::Message {
                message_id,
                role,
                content,
                function_call,
                created_at,
            } => {
                if let Some(meta) = &mut self.meta {
                    meta.last_message_at = created_at;
                }
                self.messages.push(LoggedMessage {
                    id: message_id,
                    conversation_id,
                    role,
                    content,
                    function_call,
                    created_at,
                });
            }
        }
    }
}

/// JSONL conversation log rooted at a directory.
pub struct JsonlConversationLog {
    root: PathBuf,
    /// Serialize write access to rollout files.
    write_lock: Mutex<()>,
}

impl JsonlConversationLog {
    /// Create a new JSONL log under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, LogError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL conversation log (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn rollout_path(&self, conversation_id: ConversationId) -> PathBuf {
        self.root.join(format!("{conversation_id}.jsonl"))
    }

    fn read_rollout(&self, conversation_id: ConversationId) -> Result<Option<Rollout>, LogError> {
        let path = self.rollout_path(conversation_id);
        if !path.exists() {
            return Ok(None);
        }
        let file = OpenOptions::new().read(true).open(&path)?;
        let reader = BufReader::new(file);
        let mut rollout = Rollout::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: RolloutEvent = serde_json::from_str(&line)?;
            rollout.apply(conversation_id, event);
        }
        Ok(Some(rollout))
    }

    /// Replay every rollout under the root. Files that are not rollouts are
    /// skipped by name shape.
    fn read_all_rollouts(&self) -> Result<Vec<Rollout>, LogError> {
        let mut rollouts = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = Path::new(&name)
                .file_stem()
                .and_then(|s| s.to_str())
            else {
                continue;
            };
            if name.to_string_lossy().ends_with(".jsonl")
                && let Ok(conversation_id) = Uuid::parse_str(stem)
                && let Some(rollout) = self.read_rollout(conversation_id)?
            {
                rollouts.push(rollout);
            }
        }
        Ok(rollouts)
    }

    fn write_event(
        &self,
        conversation_id: ConversationId,
        event: &RolloutEvent,
    ) -> Result<(), LogError> {
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(conversation_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn write_new_rollout(
        &self,
        conversation_id: ConversationId,
        event: &RolloutEvent,
    ) -> Result<(), LogError> {
        let _guard = self.write_lock.lock();
        let path = self.rollout_path(conversation_id);
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        let header = serde_json::to_string(&RolloutEvent::SchemaVersion {
            version: SCHEMA_VERSION,
        })?;
        writeln!(file, "{header}")?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[async_trait]
impl ConversationLog for JsonlConversationLog {
    async fn get_or_create_conversation(
        &self,
        owner: &str,
        channel: &str,
    ) -> Result<ConversationId, LogError> {
        let existing = self
            .read_all_rollouts()?
            .into_iter()
            .filter_map(|r| r.meta)
            .filter(|meta| meta.owner == owner && meta.channel == channel)
            .max_by_key(|meta| meta.last_message_at);
        if let Some(meta) = existing {
            return Ok(meta.id);
        }
        let conversation_id = Uuid::new_v4();
        self.write_new_rollout(
            conversation_id,
            &RolloutEvent::ConversationCreated {
                conversation_id,
                owner: owner.to_string(),
                channel: channel.to_string(),
                created_at: Utc::now(),
            },
        )?;
        info!(
            "created conversation (id={}, owner={}, channel={})",
            conversation_id, owner, channel
        );
        Ok(conversation_id)
    }

    async fn append(
        &self,
        conversation_id: ConversationId,
        role: MessageRole,
        content: &str,
        function_call: Option<FunctionCall>,
    ) -> Result<MessageId, LogError> {
        if !self.rollout_path(conversation_id).exists() {
            return Err(LogError::UnknownConversation(conversation_id));
        }
        let message_id = Uuid::new_v4();
        self.write_event(
            conversation_id,
            &RolloutEvent::Message {
                message_id,
                role,
                content: content.to_string(),
                function_call,
                created_at: Utc::now(),
            },
        )?;
        Ok(message_id)
    }

    async fn read(
        &self,
        conversation_id: ConversationId,
        limit: usize,
    ) -> Result<Vec<LoggedMessage>, LogError> {
        let rollout = self
            .read_rollout(conversation_id)?
            .ok_or(LogError::UnknownConversation(conversation_id))?;
        let skip = rollout.messages.len().saturating_sub(limit);
        Ok(rollout.messages[skip..].to_vec())
    }

    async fn read_all_for_owner(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<(ConversationRef, LoggedMessage)>, LogError> {
        let mut rollouts: Vec<Rollout> = self
            .read_all_rollouts()?
            .into_iter()
            .filter(|r| r.meta.as_ref().is_some_and(|m| m.owner == owner))
            .collect();
        rollouts.sort_by(|a, b| {
            let a_at = a.meta.as_ref().map(|m| m.last_message_at);
            let b_at = b.meta.as_ref().map(|m| m.last_message_at);
            b_at.cmp(&a_at)
        });
        let mut out = Vec::new();
        for rollout in rollouts {
            let Some(meta) = rollout.meta else { continue };
            for message in rollout.messages {
                if out.len() >= limit {
                    return Ok(out);
                }
                out.push((meta.clone(), message));
            }
        }
        Ok(out)
    }

    async fn count(&self, conversation_id: ConversationId) -> Result<usize, LogError> {
        let rollout = self
            .read_rollout(conversation_id)?
            .ok_or(LogError::UnknownConversation(conversation_id))?;
        Ok(rollout.messages.len())
    }
}
