//! Handler-level tests for the management API.

use axum::Json;
use axum::extract::{Path, Query, State};
use mnemo_config::{MnemoConfig, OrchestratorConfig};
use mnemo_core::{EngineCell, MemoryOrchestrator};
use mnemo_engine::{EngineError, MemoryEngine, MemoryStore};
use mnemo_server::routes::{
    self, CleanupQuery, ContextQuery, CreateEntityRequest, SearchRequest, StatusQuery,
    StoreMemoryRequest,
};
use mnemo_server::AppState;
use mnemo_test_utils::{FixedExtraction, HashEmbedding, InMemoryConversationLog};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn ready_state() -> Arc<AppState> {
    let log = Arc::new(InMemoryConversationLog::new());
    let store = MemoryStore::open_in_memory().expect("store");
    let engine = MemoryEngine::new(
        store,
        Arc::new(HashEmbedding::new()),
        Arc::new(FixedExtraction::empty()),
        log.clone(),
    );
    Arc::new(AppState {
        orchestrator: MemoryOrchestrator::new(
            log,
            EngineCell::preloaded(engine),
            OrchestratorConfig::default(),
        ),
        config: MnemoConfig::default(),
    })
}

fn unavailable_state() -> Arc<AppState> {
    let log = Arc::new(InMemoryConversationLog::new());
    Arc::new(AppState {
        orchestrator: MemoryOrchestrator::new(
            log,
            EngineCell::new(Box::new(|| {
                Err(EngineError::Io(std::io::Error::other("store offline")))
            })),
            OrchestratorConfig::default(),
        ),
        config: MnemoConfig::default(),
    })
}

#[tokio::test]
async fn status_reflects_engine_readiness() {
    let ready = routes::status(State(ready_state()), Query(StatusQuery::default())).await;
    assert_eq!(ready.0.ready, true);

    let unavailable =
        routes::status(State(unavailable_state()), Query(StatusQuery::default())).await;
    assert_eq!(unavailable.0.ready, false);
    assert_eq!(unavailable.0.stats.entity_count, 0);
    assert_eq!(unavailable.0.unique_owners, None);
}

#[tokio::test]
async fn status_reports_store_counts_globally_and_per_owner() {
    let state = ready_state();
    routes::create_entity(
        State(state.clone()),
        Json(
            serde_json::from_value::<CreateEntityRequest>(serde_json::json!({
                "owner": "jane@example.com",
                "name": "Jane Doe",
                "entity_type": "customer",
                "observations": ["bought a sectional sofa"],
            }))
            .expect("request"),
        ),
    )
    .await
    .expect("create");

    let global = routes::status(State(state.clone()), Query(StatusQuery::default())).await;
    assert_eq!(global.0.stats.entity_count, 1);
    assert_eq!(global.0.unique_owners, Some(1));

    let scoped = routes::status(
        State(state),
        Query(StatusQuery {
            owner: Some("sam@example.com".to_string()),
        }),
    )
    .await;
    assert_eq!(scoped.0.stats.entity_count, 0);
    assert_eq!(scoped.0.unique_owners, None);
}

#[tokio::test]
async fn entity_create_and_search_round_trip() {
    let state = ready_state();

    let created = routes::create_entity(
        State(state.clone()),
        Json(
            serde_json::from_value::<CreateEntityRequest>(serde_json::json!({
                "owner": "jane@example.com",
                "name": "Jane Doe",
                "entity_type": "customer",
                "observations": ["bought a sectional sofa"],
            }))
            .expect("request"),
        ),
    )
    .await
    .expect("create");

    let matches = routes::search_entities(
        State(state),
        Json(SearchRequest {
            query: "customer who bought a sectional sofa".to_string(),
            owner: "jane@example.com".to_string(),
            limit: None,
            min_similarity: Some(0.1),
        }),
    )
    .await;

    assert_eq!(matches.0.len(), 1);
    assert_eq!(matches.0[0].entity.id, created.0.id);
}

#[tokio::test]
async fn searches_degrade_to_empty_without_an_engine() {
    let state = unavailable_state();
    let request = SearchRequest {
        query: "anything".to_string(),
        owner: "jane@example.com".to_string(),
        limit: None,
        min_similarity: None,
    };
    let entities = routes::search_entities(State(state.clone()), Json(request)).await;
    assert_eq!(entities.0.len(), 0);

    let context = routes::context(
        State(state),
        Path("jane@example.com".to_string()),
        Query(ContextQuery {
            query: "anything".to_string(),
        }),
    )
    .await;
    assert_eq!(context.0.formatted_context, "");
    assert_eq!(context.0.has_context, false);
}

#[tokio::test]
async fn erasure_fails_loudly_without_an_engine() {
    let result =
        routes::forget_user(State(unavailable_state()), Path("jane@example.com".to_string()))
            .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn erasure_removes_stored_memories() {
    let state = ready_state();
    routes::store_memory(
        State(state.clone()),
        Json(
            serde_json::from_value::<StoreMemoryRequest>(serde_json::json!({
                "owner": "jane@example.com",
                "content": "prefers gray fabric",
                "importance": 0.8,
            }))
            .expect("request"),
        ),
    )
    .await
    .expect("store");

    routes::forget_user(State(state.clone()), Path("jane@example.com".to_string()))
        .await
        .expect("erase");

    let summary = routes::user_summary(State(state), Path("jane@example.com".to_string())).await;
    assert_eq!(summary.0.stats.memory_count, 0);
}

#[tokio::test]
async fn cleanup_reports_removed_count() {
    let removed = routes::cleanup(State(ready_state()), Query(CleanupQuery::default()))
        .await
        .expect("cleanup");
    assert_eq!(removed.0.removed, 0);
}

#[tokio::test]
async fn cleanup_parameters_override_configured_retention() {
    let state = ready_state();
    routes::store_memory(
        State(state.clone()),
        Json(
            serde_json::from_value::<StoreMemoryRequest>(serde_json::json!({
                "owner": "jane@example.com",
                "content": "asked about a floor lamp once",
                "importance": 0.1,
            }))
            .expect("request"),
        ),
    )
    .await
    .expect("store");

    // Configured retention keeps anything younger than 90 days.
    let kept = routes::cleanup(State(state.clone()), Query(CleanupQuery::default()))
        .await
        .expect("cleanup");
    assert_eq!(kept.0.removed, 0);

    let removed = routes::cleanup(
        State(state),
        Query(CleanupQuery {
            days_old: Some(0),
            min_access_count: Some(1),
        }),
    )
    .await
    .expect("cleanup");
    assert_eq!(removed.0.removed, 1);
}
