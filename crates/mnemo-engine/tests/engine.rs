//! End-to-end engine tests over an in-memory store with deterministic
//! stub providers.

use chrono::Duration;
use mnemo_engine::{EntityDraft, MemoryDraft, MemoryEngine, MemoryStore, RelationDraft};
use mnemo_protocol::{
    ConversationInsights, ConversationLog, ExtractedEntity, ExtractedMemory, ExtractedRelation,
    MessageRole,
};
use mnemo_test_utils::{
    FailingEmbedding, FailingExtraction, FixedExtraction, HashEmbedding, InMemoryConversationLog,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn engine_with(
    extraction: Arc<dyn mnemo_protocol::ExtractionProvider>,
    log: Arc<InMemoryConversationLog>,
) -> MemoryEngine {
    let store = MemoryStore::open_in_memory().expect("open store");
    MemoryEngine::new(store, Arc::new(HashEmbedding::new()), extraction, log)
}

fn engine() -> MemoryEngine {
    engine_with(
        Arc::new(FixedExtraction::empty()),
        Arc::new(InMemoryConversationLog::new()),
    )
}

#[tokio::test]
async fn entity_search_is_scoped_to_owner() {
    let engine = engine();
    engine
        .create_entity(
            EntityDraft::new("Jane Doe", "customer")
                .with_observations(vec!["bought a sectional sofa".to_string()]),
            "user-a",
        )
        .await
        .expect("create entity");

    let own = engine
        .semantic_search_entities("customer who bought a sectional sofa", "user-a", 5, 0.1)
        .await;
    let other = engine
        .semantic_search_entities("customer who bought a sectional sofa", "user-b", 5, 0.1)
        .await;

    assert_eq!(own.len(), 1);
    assert_eq!(own[0].entity.name, "Jane Doe");
    assert!(own[0].similarity >= 0.1);
    assert_eq!(other.len(), 0);
}

#[tokio::test]
async fn entity_search_applies_floor_and_orders_by_similarity() {
    let engine = engine();
    engine
        .create_entity(
            EntityDraft::new("Oak Dining Table", "product")
                .with_observations(vec!["oak dining table six seats".to_string()]),
            "u",
        )
        .await
        .expect("create entity");
    engine
        .create_entity(
            EntityDraft::new("Delivery Truck", "issue")
                .with_observations(vec!["driver ran late on friday".to_string()]),
            "u",
        )
        .await
        .expect("create entity");

    let matches = engine
        .semantic_search_entities("oak dining table", "u", 5, 0.3)
        .await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entity.name, "Oak Dining Table");

    // With the floor relaxed both rows return, best match first.
    let matches = engine
        .semantic_search_entities("oak dining table", "u", 5, 0.0)
        .await;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].entity.name, "Oak Dining Table");
    assert!(matches[0].similarity > matches[1].similarity);
}

#[tokio::test]
async fn memory_retrieval_ranks_importance_above_similarity() {
    let engine = engine();
    // Less similar to the query but critically important.
    engine
        .store_long_term_memory(
            MemoryDraft::new("always deliver to the rear entrance")
                .with_importance(0.9)
                .with_type("fact"),
            "u",
        )
        .await
        .expect("store memory");
    // Nearly identical to the query but low importance.
    engine
        .store_long_term_memory(
            MemoryDraft::new("prefers gray fabric upholstery")
                .with_importance(0.2)
                .with_type("preference"),
            "u",
        )
        .await
        .expect("store memory");

    let matches = engine
        .retrieve_long_term_memories("gray fabric upholstery preference", "u", 3, 0.0)
        .await;
    assert_eq!(matches.len(), 2);
    assert_eq!(
        matches[0].memory.content,
        "always deliver to the rear entrance"
    );
    assert!(matches[1].similarity > matches[0].similarity);
}

#[tokio::test]
async fn retrieval_bumps_access_counts_on_returned_rows() {
    let engine = engine();
    engine
        .store_long_term_memory(MemoryDraft::new("prefers weekend deliveries"), "u")
        .await
        .expect("store memory");

    let first = engine
        .retrieve_long_term_memories("weekend deliveries", "u", 3, 0.0)
        .await;
    assert_eq!(first[0].memory.access_count, 0);

    let second = engine
        .retrieve_long_term_memories("weekend deliveries", "u", 3, 0.0)
        .await;
    assert_eq!(second[0].memory.access_count, 1);
}

#[tokio::test]
async fn retrieval_degrades_to_empty_when_embedding_fails() {
    let store = MemoryStore::open_in_memory().expect("open store");
    let engine = MemoryEngine::new(
        store,
        Arc::new(FailingEmbedding::new()),
        Arc::new(FixedExtraction::empty()),
        Arc::new(InMemoryConversationLog::new()),
    );

    let entities = engine.semantic_search_entities("anything", "u", 5, 0.0).await;
    let memories = engine
        .retrieve_long_term_memories("anything", "u", 3, 0.0)
        .await;
    assert_eq!(entities.len(), 0);
    assert_eq!(memories.len(), 0);
}

#[tokio::test]
async fn relation_with_unresolved_endpoint_is_skipped_not_failed() {
    let engine = engine();
    engine
        .create_entity(EntityDraft::new("Jane Doe", "customer"), "u")
        .await
        .expect("create entity");

    engine
        .create_relation(
            RelationDraft::new("Jane Doe", "purchased", "Nonexistent Product"),
            "u",
        )
        .await
        .expect("skip is not an error");

    let stats = engine.get_memory_stats("u").expect("stats");
    assert_eq!(stats.relation_count, 0);
}

#[tokio::test]
async fn context_combines_entities_memories_and_relations() {
    let engine = engine();
    engine
        .create_entity(
            EntityDraft::new("Jane Doe", "customer")
                .with_observations(vec!["repeat sofa customer".to_string()]),
            "u",
        )
        .await
        .expect("create entity");
    engine
        .create_entity(
            EntityDraft::new("Sectional Sofa", "product")
                .with_observations(vec!["gray sectional sofa".to_string()]),
            "u",
        )
        .await
        .expect("create entity");
    engine
        .create_relation(
            RelationDraft::new("Jane Doe", "purchased", "Sectional Sofa"),
            "u",
        )
        .await
        .expect("create relation");
    engine
        .store_long_term_memory(
            MemoryDraft::new("Jane Doe prefers gray sofa fabric").with_importance(0.8),
            "u",
        )
        .await
        .expect("store memory");

    let context = engine
        .get_conversation_context("Jane Doe gray sofa customer", "u")
        .await;

    assert!(!context.entities.is_empty());
    assert!(!context.memories.is_empty());
    assert_eq!(
        context.context_strength,
        context.entities.len() + context.memories.len()
    );
    let purchased = context
        .relations
        .iter()
        .find(|r| r.relation_type == "purchased")
        .expect("relation present");
    assert_eq!(purchased.from_name, "Jane Doe");
    assert_eq!(purchased.to_name, "Sectional Sofa");
}

#[tokio::test]
async fn empty_query_match_yields_zero_strength_context() {
    let engine = engine();
    let context = engine
        .get_conversation_context("completely unrelated query", "nobody")
        .await;
    assert_eq!(context.context_strength, 0);
    assert_eq!(context.relations.len(), 0);
}

#[tokio::test]
async fn processing_persists_all_insight_kinds() {
    let log = Arc::new(InMemoryConversationLog::new());
    let insights = ConversationInsights {
        entities: vec![
            ExtractedEntity {
                name: "Jane Doe".to_string(),
                entity_type: "customer".to_string(),
                observations: vec!["repeat customer".to_string()],
            },
            ExtractedEntity {
                name: "Sectional Sofa".to_string(),
                entity_type: "product".to_string(),
                observations: vec![],
            },
        ],
        relations: vec![ExtractedRelation {
            from_entity: "Jane Doe".to_string(),
            to_entity: "Sectional Sofa".to_string(),
            relation_type: "purchased".to_string(),
            strength: 0.9,
        }],
        long_term_memories: vec![ExtractedMemory {
            content: "prefers gray fabric".to_string(),
            memory_type: "preference".to_string(),
            importance: 0.8,
        }],
        summary: Some("Jane bought a sectional sofa.".to_string()),
    };
    let engine = engine_with(Arc::new(FixedExtraction::new(insights)), log.clone());

    let conversation = log
        .get_or_create_conversation("u", "webchat")
        .await
        .expect("conversation");
    log.append(conversation, MessageRole::User, "I bought a sectional", None)
        .await
        .expect("append");

    let report = engine.process_conversation_memory(conversation, "u").await;
    assert_eq!(report.entities_stored, 2);
    assert_eq!(report.relations_stored, 1);
    assert_eq!(report.memories_stored, 1);
    assert_eq!(report.summary_stored, true);
    assert_eq!(report.failures, 0);

    let stats = engine.get_memory_stats("u").expect("stats");
    assert_eq!(stats.entity_count, 2);
    assert_eq!(stats.relation_count, 1);
    assert_eq!(stats.memory_count, 1);
    assert_eq!(stats.summary_count, 1);

    // Memories extracted from a conversation carry its id.
    let matches = engine
        .retrieve_long_term_memories("gray fabric", "u", 3, 0.0)
        .await;
    assert_eq!(matches[0].memory.source_conversation_id, Some(conversation));
}

#[tokio::test]
async fn processing_an_empty_conversation_stores_nothing() {
    let log = Arc::new(InMemoryConversationLog::new());
    let engine = engine_with(Arc::new(FailingExtraction::new()), log.clone());

    let conversation = log
        .get_or_create_conversation("u", "webchat")
        .await
        .expect("conversation");

    // No messages: extraction is never called, nothing lands.
    let report = engine.process_conversation_memory(conversation, "u").await;
    assert_eq!(report, Default::default());
    let stats = engine.get_memory_stats("u").expect("stats");
    assert_eq!(stats.entity_count, 0);
}

#[tokio::test]
async fn extraction_failure_yields_empty_insights_not_error() {
    let log = Arc::new(InMemoryConversationLog::new());
    let engine = engine_with(Arc::new(FailingExtraction::new()), log.clone());

    let conversation = log
        .get_or_create_conversation("u", "webchat")
        .await
        .expect("conversation");
    log.append(conversation, MessageRole::User, "hello", None)
        .await
        .expect("append");

    let insights = engine.extract_conversation_insights(conversation, "u").await;
    assert!(insights.is_empty());
}

#[tokio::test]
async fn cleanup_requires_all_three_conditions() {
    let engine = engine();
    engine
        .store_long_term_memory(
            MemoryDraft::new("stale trivia nobody asked about").with_importance(0.1),
            "u",
        )
        .await
        .expect("store memory");
    engine
        .store_long_term_memory(
            MemoryDraft::new("allergy to latex foam").with_importance(0.95),
            "u",
        )
        .await
        .expect("store memory");
    engine
        .store_long_term_memory(
            MemoryDraft::new("frequently asked about oak finish").with_importance(0.1),
            "u",
        )
        .await
        .expect("store memory");
    // Retrieval protects the frequently-asked row via its access count.
    let accessed = engine
        .retrieve_long_term_memories("oak finish", "u", 1, 0.3)
        .await;
    assert_eq!(
        accessed[0].memory.content,
        "frequently asked about oak finish"
    );

    // Zero age threshold makes every row "old"; only the unimportant,
    // never-accessed one qualifies.
    let removed = engine
        .cleanup_old_memories(Duration::zero(), 1)
        .expect("cleanup");
    assert_eq!(removed, 1);

    let stats = engine.get_memory_stats("u").expect("stats");
    assert_eq!(stats.memory_count, 2);
}

#[tokio::test]
async fn erasure_removes_owner_and_only_owner() {
    let engine = engine();
    for owner in ["keep", "erase"] {
        engine
            .create_entity(EntityDraft::new("Jane Doe", "customer"), owner)
            .await
            .expect("create entity");
        engine
            .create_entity(EntityDraft::new("Sofa", "product"), owner)
            .await
            .expect("create entity");
        engine
            .create_relation(RelationDraft::new("Jane Doe", "purchased", "Sofa"), owner)
            .await
            .expect("create relation");
        engine
            .store_long_term_memory(MemoryDraft::new("prefers oak"), owner)
            .await
            .expect("store memory");
    }

    engine.delete_owner_data("erase").expect("erase");

    let erased = engine.get_memory_stats("erase").expect("stats");
    assert_eq!(erased, Default::default());
    let kept = engine.get_memory_stats("keep").expect("stats");
    assert_eq!(kept.entity_count, 2);
    assert_eq!(kept.relation_count, 1);
    assert_eq!(kept.memory_count, 1);

    // Erasing an absent owner is a no-op, not an error.
    engine.delete_owner_data("erase").expect("idempotent");
}

#[tokio::test]
async fn duplicate_entity_names_resolve_to_newest_row() {
    let engine = engine();
    let first = engine
        .create_entity(EntityDraft::new("Jane Doe", "customer"), "u")
        .await
        .expect("create entity");
    let second = engine
        .create_entity(EntityDraft::new("Jane Doe", "customer"), "u")
        .await
        .expect("create entity");
    assert_ne!(first, second);

    engine
        .create_entity(EntityDraft::new("Sofa", "product"), "u")
        .await
        .expect("create entity");
    engine
        .create_relation(RelationDraft::new("Jane Doe", "purchased", "Sofa"), "u")
        .await
        .expect("create relation");

    // Both duplicate rows survive; the edge still resolved and landed.
    let stats = engine.get_memory_stats("u").expect("stats");
    assert_eq!(stats.entity_count, 3);
    assert_eq!(stats.relation_count, 1);
}

#[tokio::test]
async fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.db");

    {
        let store = MemoryStore::open(&path).expect("open");
        let engine = MemoryEngine::new(
            store,
            Arc::new(HashEmbedding::new()),
            Arc::new(FixedExtraction::empty()),
            Arc::new(InMemoryConversationLog::new()),
        );
        engine
            .store_long_term_memory(MemoryDraft::new("prefers oak finish"), "u")
            .await
            .expect("store memory");
    }

    let store = MemoryStore::open(&path).expect("reopen");
    let engine = MemoryEngine::new(
        store,
        Arc::new(HashEmbedding::new()),
        Arc::new(FixedExtraction::empty()),
        Arc::new(InMemoryConversationLog::new()),
    );
    let matches = engine
        .retrieve_long_term_memories("oak finish", "u", 3, 0.1)
        .await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].memory.content, "prefers oak finish");
}
