//! HTTP surface: utterance processing, proactive triggers, health.

pub mod process;
pub mod stream;
pub mod trigger;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::IdentityVerifier;
use crate::pipeline::AgentPipeline;

/// Largest accepted request body (audio uploads).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: AgentPipeline,
    /// Token verifier. `None` means every caller is anonymous.
    pub verifier: Option<Arc<dyn IdentityVerifier>>,
}

/// Build the Axum router.
pub fn voice_routes(pipeline: AgentPipeline, verifier: Option<Arc<dyn IdentityVerifier>>) -> Router {
    let state = AppState { pipeline, verifier };

    Router::new()
        .route("/health", get(health))
        .route("/process-utterance", post(process::process_utterance))
        .route("/api/v1/process-audio", post(process::process_utterance))
        .route("/v1/agent/trigger", post(trigger::trigger_agent))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "voice-assist"
    }))
}
