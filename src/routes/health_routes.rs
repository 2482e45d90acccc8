//! Health check endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Reports liveness. The identity service is not contacted.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let logging = &state.config.logging;
    Json(json!({
        "status": "ok",
        "service": logging.service_name,
        "version": logging.service_version,
    }))
}
