//! Management HTTP API for the mnemo memory subsystem.
//!
//! Thin axum layer over the orchestrator. Retrieval endpoints degrade to
//! empty payloads when the engine is unavailable; only compliance erasure
//! surfaces failure to the client.

pub mod routes;

use axum::Router;
use axum::routing::{delete, get, post};
use log::info;
use mnemo_config::MnemoConfig;
use mnemo_core::MemoryOrchestrator;
use std::sync::Arc;

/// Shared handler state.
pub struct AppState {
    pub orchestrator: MemoryOrchestrator,
    pub config: MnemoConfig,
}

/// Build the management API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/memory/status", get(routes::status))
        .route("/memory/user/{owner}/summary", get(routes::user_summary))
        .route("/memory/user/{owner}", delete(routes::forget_user))
        .route("/memory/search/entities", post(routes::search_entities))
        .route("/memory/search/memories", post(routes::search_memories))
        .route("/memory/context/{owner}", get(routes::context))
        .route("/memory/entity/create", post(routes::create_entity))
        .route("/memory/relation/create", post(routes::create_relation))
        .route("/memory/memory/store", post(routes::store_memory))
        .route(
            "/memory/conversation/{conversation_id}/process",
            post(routes::process_conversation),
        )
        .route("/memory/maintenance/cleanup", post(routes::cleanup))
        .with_state(state)
}

/// Wire the production orchestrator from config and serve until shutdown.
pub async fn serve(config: MnemoConfig) -> anyhow::Result<()> {
    let orchestrator = MemoryOrchestrator::from_config(&config)?;
    let bind = config.server.bind.clone();
    let state = Arc::new(AppState {
        orchestrator,
        config,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("management api listening (addr={})", bind);
    axum::serve(listener, app).await?;
    Ok(())
}
