//! SQLite persistence for the structured substores.
//!
//! One connection behind a `parking_lot` mutex; every call locks, runs its
//! statements, and releases before any await point upstream. Vectors are
//! stored as little-endian f32 blobs and compared in process.

use crate::error::EngineError;
use crate::model::{
    ConversationSummary, GlobalMemoryStats, LongTermMemory, MemoryEntity, MemoryRelation,
    MemoryStats, RelationTriple,
};
use crate::vector::{bytes_to_f32_vec, f32_vec_to_bytes};
use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memory_entities (
    entity_id    TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    entity_type  TEXT NOT NULL,
    observations TEXT NOT NULL,
    confidence   REAL NOT NULL,
    created_at   TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    metadata     TEXT NOT NULL,
    embedding    BLOB NOT NULL,
    owner        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_owner ON memory_entities(owner);
CREATE INDEX IF NOT EXISTS idx_entities_name ON memory_entities(name, owner);

CREATE TABLE IF NOT EXISTS memory_relations (
    relation_id    TEXT PRIMARY KEY,
    from_entity_id TEXT NOT NULL,
    to_entity_id   TEXT NOT NULL,
    relation_type  TEXT NOT NULL,
    strength       REAL NOT NULL,
    confidence     REAL NOT NULL,
    created_at     TEXT NOT NULL,
    metadata       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_relations_from ON memory_relations(from_entity_id);
CREATE INDEX IF NOT EXISTS idx_relations_to ON memory_relations(to_entity_id);

CREATE TABLE IF NOT EXISTS long_term_memories (
    memory_id              TEXT PRIMARY KEY,
    owner                  TEXT NOT NULL,
    content                TEXT NOT NULL,
    memory_type            TEXT NOT NULL,
    importance_score       REAL NOT NULL,
    access_count           INTEGER NOT NULL,
    last_accessed          TEXT NOT NULL,
    created_at             TEXT NOT NULL,
    embedding              BLOB NOT NULL,
    source_conversation_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_memories_owner ON long_term_memories(owner);

CREATE TABLE IF NOT EXISTS conversation_summaries (
    summary_id      TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    summary_text    TEXT NOT NULL,
    key_entities    TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    embedding       BLOB NOT NULL,
    owner           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_summaries_owner ON conversation_summaries(owner);
";

/// SQLite-backed store for entities, relations, memories, and summaries.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (or create) the store at the given path and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        info!("opened memory store (path={})", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store; used by tests.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert_entity(
        &self,
        entity: &MemoryEntity,
        embedding: &[f32],
    ) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memory_entities
             (entity_id, name, entity_type, observations, confidence, created_at,
              last_updated, metadata, embedding, owner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entity.id.to_string(),
                entity.name,
                entity.entity_type,
                serde_json::to_string(&entity.observations)?,
                entity.confidence,
                entity.created_at,
                entity.last_updated,
                serde_json::to_string(&entity.metadata)?,
                f32_vec_to_bytes(embedding),
                entity.owner,
            ],
        )?;
        Ok(())
    }

    /// Resolve an entity name within an owner's graph. Duplicate names are
    /// legal; the most recently created row wins.
    pub fn resolve_entity_id(&self, name: &str, owner: &str) -> Result<Option<Uuid>, EngineError> {
        let conn = self.conn.lock();
        let id: Option<String> = conn
            .query_row(
                "SELECT entity_id FROM memory_entities
                 WHERE name = ?1 AND owner = ?2
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![name, owner],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(raw) => Ok(Some(parse_uuid(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn insert_relation(&self, relation: &MemoryRelation) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memory_relations
             (relation_id, from_entity_id, to_entity_id, relation_type, strength,
              confidence, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                relation.id.to_string(),
                relation.from_entity_id.to_string(),
                relation.to_entity_id.to_string(),
                relation.relation_type,
                relation.strength,
                relation.confidence,
                relation.created_at,
                serde_json::to_string(&relation.metadata)?,
            ],
        )?;
        Ok(())
    }

    /// All of an owner's entities with their embeddings. Rows with corrupt
    /// embedding blobs are skipped with a warning.
    pub fn entities_for_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<(MemoryEntity, Vec<f32>)>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT entity_id, name, entity_type, observations, confidence, created_at,
                    last_updated, metadata, embedding, owner
             FROM memory_entities WHERE owner = ?1",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            let entity = entity_from_row(row)?;
            let blob: Vec<u8> = row.get(8)?;
            Ok((entity, blob))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (entity, blob) = row?;
            match bytes_to_f32_vec(&blob) {
                Some(vector) => out.push((entity, vector)),
                None => warn!(
                    "skipping entity with corrupt embedding (id={}, bytes={})",
                    entity.id,
                    blob.len()
                ),
            }
        }
        Ok(out)
    }

    /// Outgoing relations of an entity with resolved endpoint names,
    /// strongest first.
    pub fn relations_from(
        &self,
        entity_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RelationTriple>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT f.name, r.relation_type, t.name, r.strength
             FROM memory_relations r
             JOIN memory_entities f ON f.entity_id = r.from_entity_id
             JOIN memory_entities t ON t.entity_id = r.to_entity_id
             WHERE r.from_entity_id = ?1
             ORDER BY r.strength DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![entity_id.to_string(), limit as i64], |row| {
            Ok(RelationTriple {
                from_name: row.get(0)?,
                relation_type: row.get(1)?,
                to_name: row.get(2)?,
                strength: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn insert_memory(
        &self,
        memory: &LongTermMemory,
        embedding: &[f32],
    ) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO long_term_memories
             (memory_id, owner, content, memory_type, importance_score, access_count,
              last_accessed, created_at, embedding, source_conversation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                memory.id.to_string(),
                memory.owner,
                memory.content,
                memory.memory_type,
                memory.importance_score,
                memory.access_count,
                memory.last_accessed,
                memory.created_at,
                f32_vec_to_bytes(embedding),
                memory.source_conversation_id.map(|id| id.to_string()),
            ],
        )?;
        Ok(())
    }

    /// All of an owner's long-term memories with their embeddings.
    pub fn memories_for_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<(LongTermMemory, Vec<f32>)>, EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT memory_id, owner, content, memory_type, importance_score, access_count,
                    last_accessed, created_at, embedding, source_conversation_id
             FROM long_term_memories WHERE owner = ?1",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            let memory = memory_from_row(row)?;
            let blob: Vec<u8> = row.get(8)?;
            Ok((memory, blob))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (memory, blob) = row?;
            match bytes_to_f32_vec(&blob) {
                Some(vector) => out.push((memory, vector)),
                None => warn!(
                    "skipping memory with corrupt embedding (id={}, bytes={})",
                    memory.id,
                    blob.len()
                ),
            }
        }
        Ok(out)
    }

    /// Bump access counts and refresh `last_accessed` for retrieved rows.
    pub fn record_memory_access(
        &self,
        ids: &[Uuid],
        accessed_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "UPDATE long_term_memories
             SET access_count = access_count + 1, last_accessed = ?1
             WHERE memory_id = ?2",
        )?;
        for id in ids {
            stmt.execute(params![accessed_at, id.to_string()])?;
        }
        Ok(())
    }

    pub fn insert_summary(
        &self,
        summary: &ConversationSummary,
        embedding: &[f32],
    ) -> Result<(), EngineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversation_summaries
             (summary_id, conversation_id, summary_text, key_entities, created_at,
              embedding, owner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.id.to_string(),
                summary.conversation_id.to_string(),
                summary.summary_text,
                serde_json::to_string(&summary.key_entities)?,
                summary.created_at,
                f32_vec_to_bytes(embedding),
                summary.owner,
            ],
        )?;
        Ok(())
    }

    /// Per-owner record counts. Relations are counted through their source
    /// entity since the relation table carries no owner column.
    pub fn stats(&self, owner: &str) -> Result<MemoryStats, EngineError> {
        let conn = self.conn.lock();
        let entity_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_entities WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        let relation_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_relations r
             JOIN memory_entities e ON e.entity_id = r.from_entity_id
             WHERE e.owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        let memory_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM long_term_memories WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        let summary_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversation_summaries WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(MemoryStats {
            entity_count: entity_count as usize,
            relation_count: relation_count as usize,
            memory_count: memory_count as usize,
            summary_count: summary_count as usize,
        })
    }

    /// Record counts across all owners. Owners are counted from the entity
    /// table, the one substore every ingest path writes to.
    pub fn global_stats(&self) -> Result<GlobalMemoryStats, EngineError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM memory_entities),
                (SELECT COUNT(*) FROM memory_relations),
                (SELECT COUNT(*) FROM long_term_memories),
                (SELECT COUNT(*) FROM conversation_summaries),
                (SELECT COUNT(DISTINCT owner) FROM memory_entities)",
            [],
            |row| {
                Ok(GlobalMemoryStats {
                    totals: MemoryStats {
                        entity_count: row.get::<_, i64>(0)? as usize,
                        relation_count: row.get::<_, i64>(1)? as usize,
                        memory_count: row.get::<_, i64>(2)? as usize,
                        summary_count: row.get::<_, i64>(3)? as usize,
                    },
                    unique_owners: row.get::<_, i64>(4)? as usize,
                })
            },
        )
        .map_err(EngineError::from)
    }

    /// Delete stale low-value memories. A row is removed only when it is
    /// older than the cutoff AND rarely accessed AND below the importance
    /// floor; any single signal of value keeps it.
    pub fn cleanup_memories(
        &self,
        cutoff: DateTime<Utc>,
        min_access_count: i64,
        importance_floor: f64,
    ) -> Result<usize, EngineError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM long_term_memories
             WHERE created_at < ?1 AND access_count < ?2 AND importance_score < ?3",
            params![cutoff, min_access_count, importance_floor],
        )?;
        Ok(removed)
    }

    /// Remove every row belonging to an owner across all substores.
    /// Relations are removed when either endpoint is owned.
    pub fn delete_owner(&self, owner: &str) -> Result<(), EngineError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM memory_relations
             WHERE from_entity_id IN
                   (SELECT entity_id FROM memory_entities WHERE owner = ?1)
                OR to_entity_id IN
                   (SELECT entity_id FROM memory_entities WHERE owner = ?1)",
            params![owner],
        )?;
        tx.execute(
            "DELETE FROM memory_entities WHERE owner = ?1",
            params![owner],
        )?;
        tx.execute(
            "DELETE FROM long_term_memories WHERE owner = ?1",
            params![owner],
        )?;
        tx.execute(
            "DELETE FROM conversation_summaries WHERE owner = ?1",
            params![owner],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn entity_from_row(row: &Row<'_>) -> Result<MemoryEntity, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let raw_observations: String = row.get(3)?;
    let raw_metadata: String = row.get(7)?;
    Ok(MemoryEntity {
        id: parse_uuid_sql(0, &raw_id)?,
        name: row.get(1)?,
        entity_type: row.get(2)?,
        observations: parse_json_sql(3, &raw_observations)?,
        confidence: row.get(4)?,
        created_at: row.get(5)?,
        last_updated: row.get(6)?,
        metadata: parse_json_sql(7, &raw_metadata)?,
        owner: row.get(9)?,
    })
}

fn memory_from_row(row: &Row<'_>) -> Result<LongTermMemory, rusqlite::Error> {
    let raw_id: String = row.get(0)?;
    let raw_source: Option<String> = row.get(9)?;
    let source_conversation_id = match raw_source {
        Some(raw) => Some(parse_uuid_sql(9, &raw)?),
        None => None,
    };
    Ok(LongTermMemory {
        id: parse_uuid_sql(0, &raw_id)?,
        owner: row.get(1)?,
        content: row.get(2)?,
        memory_type: row.get(3)?,
        importance_score: row.get(4)?,
        access_count: row.get(5)?,
        last_accessed: row.get(6)?,
        created_at: row.get(7)?,
        source_conversation_id,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, EngineError> {
    Ok(parse_uuid_sql(0, raw)?)
}

fn parse_uuid_sql(index: usize, raw: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_json_sql<T: serde::de::DeserializeOwned>(
    index: usize,
    raw: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity(name: &str, owner: &str) -> MemoryEntity {
        let now = Utc::now();
        MemoryEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            entity_type: "customer".to_string(),
            observations: Vec::new(),
            confidence: 1.0,
            created_at: now,
            last_updated: now,
            metadata: serde_json::json!({}),
            owner: owner.to_string(),
        }
    }

    #[test]
    fn corrupt_embedding_blob_is_skipped_not_fatal() {
        let store = MemoryStore::open_in_memory().expect("store");
        let good = entity("Jane Doe", "jane@example.com");
        let bad = entity("Torn Row", "jane@example.com");
        store.insert_entity(&good, &[0.5, 0.5]).expect("insert");
        store.insert_entity(&bad, &[0.5, 0.5]).expect("insert");

        // Truncate one blob to a length that is not a multiple of four.
        store
            .conn
            .lock()
            .execute(
                "UPDATE memory_entities SET embedding = X'0102' WHERE entity_id = ?1",
                params![bad.id.to_string()],
            )
            .expect("corrupt");

        let rows = store.entities_for_owner("jane@example.com").expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.id, good.id);
    }

    #[test]
    fn global_stats_count_across_owners() {
        let store = MemoryStore::open_in_memory().expect("store");
        store
            .insert_entity(&entity("Jane Doe", "jane@example.com"), &[1.0])
            .expect("insert");
        store
            .insert_entity(&entity("Oak Table", "jane@example.com"), &[1.0])
            .expect("insert");
        store
            .insert_entity(&entity("Sam Roe", "sam@example.com"), &[1.0])
            .expect("insert");

        let stats = store.global_stats().expect("stats");
        assert_eq!(stats.totals.entity_count, 3);
        assert_eq!(stats.totals.relation_count, 0);
        assert_eq!(stats.unique_owners, 2);
    }
}
