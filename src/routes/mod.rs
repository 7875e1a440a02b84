// HTTP routes: read-only view of the games document

mod http;
mod prometheus;

pub use prometheus::render_prometheus;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::observation_repo::ObservationRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) repo: Arc<ObservationRepo>,
}

pub fn app(repo: Arc<ObservationRepo>) -> Router {
    let state = AppState { repo };
    Router::new()
        .route("/", get(|| async { "fleetscaler exporter" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/games", get(http::games_handler)) // GET /api/games
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
