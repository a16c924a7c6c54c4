// =============================================================================
// Status API — read-only view of the last completed tick
// =============================================================================
//
// Two public endpoints; no control surface. The tick loop owns the engine,
// so everything served here comes from cloned snapshots in SharedState.
// CORS is permissive: the payload is read-only operational telemetry.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

/// Build the status router with CORS middleware and shared state.
pub fn router(state: Arc<SharedState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state
            .state_version
            .load(std::sync::atomic::Ordering::Relaxed),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

async fn status(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    match state.snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no tick completed yet").into_response(),
    }
}
