use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{ask, dataset, export, AppState};
use crate::config::Config;
use crate::services::{DatasetLoader, QueryEngine, QueryResolver};
use crate::storage::SessionStore;

/// Create router with application state
pub fn create_router_with_state(
    config: Config,
    sessions: Arc<SessionStore>,
    engine: Arc<dyn QueryEngine>,
) -> Router {
    let body_limit = config.upload.max_bytes;
    let state = AppState {
        sessions,
        loader: Arc::new(DatasetLoader::new()),
        resolver: Arc::new(QueryResolver::new(engine)),
        config,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/datasets", get(dataset::list_datasets))
        .route("/api/datasets/active", post(dataset::set_active_dataset))
        .route("/api/upload", post(dataset::upload_dataset))
        .route("/api/preview", get(dataset::preview_dataset))
        .route("/api/ask", post(ask::ask_question))
        .route("/api/history", get(ask::get_history))
        .route("/api/export-pdf", post(export::export_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
