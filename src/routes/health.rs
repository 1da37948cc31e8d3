// src/routes/health.rs
//! Health check endpoint for the FloodPath monitor.
//!
//! Used by uptime monitors and container orchestrators. Unlike a plain
//! liveness probe it reports on the acquisition pipeline: the run flag,
//! whether both feed workers are alive, and how fresh the accepted data is.
//! See [`crate::health`] for the rules.
//!
//! Responds 200 for `healthy` and `warning`, 503 for `error`.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Utc;

use super::AppState;
use crate::health;

/// Handle `GET /health`.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let report = health::evaluate(&state.registry, &state.run_flag, Utc::now(), state.health);
    let code = if report.is_error() {
        tracing::warn!(message = ?report.message, "Health check reports error");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report))
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
