// GET handlers: version, games document, prometheus metrics

use axum::{extract::State, http::header, response::IntoResponse};

use super::AppState;
use super::prometheus::render_prometheus;
use crate::version::{NAME, VERSION};

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/games: the persisted document; may lag the poll cadence.
pub(super) async fn games_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.repo.load().await)
}

/// GET /metrics
pub(super) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let doc = state.repo.load().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render_prometheus(&doc),
    )
}
