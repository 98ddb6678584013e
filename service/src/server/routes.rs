//! Router configuration.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use axum::routing::get;
use axum::Router;

/// Build the Axum router: `/healthz`, `/readyz` and `/metrics`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}
