use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::cors::CorsLayer;

pub mod ai;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod routes;

use config::AppConfig;
use pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/active", get(active))
        .route("/health", get(health))
        .merge(routes::document_routes())
        .merge(routes::chat_routes())
        .merge(routes::export_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn active() -> &'static str {
    "active"
}

#[inline]
async fn health() -> &'static str {
    "ok"
}
