//! HTTP route handlers for the management API.

use crate::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Duration;
use log::{error, info};
use mnemo_engine::{
    ConversationContext, ENTITY_MIN_SIMILARITY, ENTITY_SEARCH_LIMIT, EntityDraft, EntityMatch,
    IngestReport, MEMORY_MIN_SIMILARITY, MEMORY_SEARCH_LIMIT, MemoryDraft, MemoryMatch,
    MemoryStats, RelationDraft,
};
use mnemo_protocol::ConversationId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    fn unavailable() -> Self {
        Self {
            error: "memory engine unavailable".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn internal(message: impl ToString) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Query string for the status endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// When set, counts are scoped to this owner instead of the whole store.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Subsystem status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub version: &'static str,
    pub stats: MemoryStats,
    /// Distinct owner count; absent for owner-scoped requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_owners: Option<usize>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let version = env!("CARGO_PKG_VERSION");
    let Some(engine) = state.orchestrator.engine() else {
        return Json(StatusResponse {
            ready: false,
            version,
            stats: MemoryStats::default(),
            unique_owners: None,
        });
    };
    let (stats, unique_owners) = match &params.owner {
        Some(owner) => match engine.get_memory_stats(owner) {
            Ok(stats) => (stats, None),
            Err(e) => {
                error!("status stats unavailable (owner={}): {}", owner, e);
                (MemoryStats::default(), None)
            }
        },
        None => match engine.get_global_stats() {
            Ok(stats) => (stats.totals, Some(stats.unique_owners)),
            Err(e) => {
                error!("status stats unavailable: {}", e);
                (MemoryStats::default(), None)
            }
        },
    };
    Json(StatusResponse {
        ready: true,
        version,
        stats,
        unique_owners,
    })
}

pub async fn user_summary(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Json<mnemo_core::MemorySummary> {
    Json(state.orchestrator.get_memory_summary_for_user(&owner).await)
}

/// Semantic search request body.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub owner: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

pub async fn search_entities(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Json<Vec<EntityMatch>> {
    let Some(engine) = state.orchestrator.engine() else {
        return Json(Vec::new());
    };
    let matches = engine
        .semantic_search_entities(
            &request.query,
            &request.owner,
            request.limit.unwrap_or(ENTITY_SEARCH_LIMIT),
            request.min_similarity.unwrap_or(ENTITY_MIN_SIMILARITY),
        )
        .await;
    Json(matches)
}

pub async fn search_memories(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Json<Vec<MemoryMatch>> {
    let Some(engine) = state.orchestrator.engine() else {
        return Json(Vec::new());
    };
    let matches = engine
        .retrieve_long_term_memories(
            &request.query,
            &request.owner,
            request.limit.unwrap_or(MEMORY_SEARCH_LIMIT),
            request.min_similarity.unwrap_or(MEMORY_MIN_SIMILARITY),
        )
        .await;
    Json(matches)
}

/// Query string for the context endpoint.
#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    #[serde(default)]
    pub query: String,
}

/// Rendered context response.
#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub formatted_context: String,
    pub raw: ConversationContext,
    pub has_context: bool,
}

pub async fn context(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Query(params): Query<ContextQuery>,
) -> Json<ContextResponse> {
    let Some(engine) = state.orchestrator.engine() else {
        return Json(ContextResponse {
            formatted_context: String::new(),
            raw: ConversationContext::default(),
            has_context: false,
        });
    };
    let raw = engine.get_conversation_context(&params.query, &owner).await;
    let formatted_context = mnemo_core::render_context(&raw);
    let has_context = raw.context_strength > 0;
    Json(ContextResponse {
        formatted_context,
        raw,
        has_context,
    })
}

/// Entity creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub owner: String,
    #[serde(flatten)]
    pub entity: EntityDraft,
}

/// Entity creation response.
#[derive(Debug, Serialize)]
pub struct CreateEntityResponse {
    pub id: uuid::Uuid,
}

pub async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateEntityRequest>,
) -> Result<Json<CreateEntityResponse>, ApiError> {
    let engine = state.orchestrator.engine().ok_or_else(ApiError::unavailable)?;
    let id = engine
        .create_entity(request.entity, &request.owner)
        .await
        .map_err(|e| {
            error!("entity creation failed: {}", e);
            ApiError::internal(e)
        })?;
    Ok(Json(CreateEntityResponse { id }))
}

/// Relation creation request body.
#[derive(Debug, Deserialize)]
pub struct CreateRelationRequest {
    pub owner: String,
    #[serde(flatten)]
    pub relation: RelationDraft,
}

pub async fn create_relation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRelationRequest>,
) -> Result<StatusCode, ApiError> {
    let engine = state.orchestrator.engine().ok_or_else(ApiError::unavailable)?;
    engine
        .create_relation(request.relation, &request.owner)
        .await
        .map_err(|e| {
            error!("relation creation failed: {}", e);
            ApiError::internal(e)
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Memory storage request body.
#[derive(Debug, Deserialize)]
pub struct StoreMemoryRequest {
    pub owner: String,
    #[serde(flatten)]
    pub memory: MemoryDraft,
}

pub async fn store_memory(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreMemoryRequest>,
) -> Result<StatusCode, ApiError> {
    let engine = state.orchestrator.engine().ok_or_else(ApiError::unavailable)?;
    engine
        .store_long_term_memory(request.memory, &request.owner)
        .await
        .map_err(|e| {
            error!("memory storage failed: {}", e);
            ApiError::internal(e)
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Conversation processing request body.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub owner: String,
}

pub async fn process_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<ConversationId>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    let engine = state.orchestrator.engine().ok_or_else(ApiError::unavailable)?;
    let report = engine
        .process_conversation_memory(conversation_id, &request.owner)
        .await;
    Ok(Json(report))
}

pub async fn forget_user(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.forget_user_data(&owner).await.map_err(|e| {
        error!("erasure failed (owner={}): {}", owner, e);
        ApiError::internal(e)
    })?;
    info!("erased user data (owner={})", owner);
    Ok(StatusCode::NO_CONTENT)
}

/// Query string for the cleanup endpoint. Unset fields fall back to the
/// configured retention policy.
#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub days_old: Option<u32>,
    #[serde(default)]
    pub min_access_count: Option<u32>,
}

/// Cleanup response.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let engine = state.orchestrator.engine().ok_or_else(ApiError::unavailable)?;
    let retention = &state.config.retention;
    let days_old = params.days_old.unwrap_or(retention.max_age_days);
    let min_access_count = params.min_access_count.unwrap_or(retention.min_access_count);
    let removed = engine
        .cleanup_old_memories(Duration::days(i64::from(days_old)), i64::from(min_access_count))
        .map_err(|e| {
            error!("cleanup failed: {}", e);
            ApiError::internal(e)
        })?;
    Ok(Json(CleanupResponse { removed }))
}
