//! Health, readiness and metrics endpoints.

use super::state::AppState;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use notifier_core::broker::ConsumerState;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
}

/// Liveness endpoint.
///
/// Returns 200 while the process is up, whatever the broker is doing.
///
/// ```bash
/// curl http://localhost:3005/healthz
/// # {"status":"ok"}
/// ```
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness check response.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReadinessResponse {
    /// `"ready"` or `"not_ready"`
    pub status: &'static str,
    /// Consumer lifecycle state
    pub consumer: &'static str,
}

/// Readiness endpoint.
///
/// 200 once the consumption loop is running, 503 with the current consumer
/// state otherwise.
///
/// ```bash
/// curl http://localhost:3005/readyz
/// # {"status":"ready","consumer":"running"}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let consumer = state.connection.state();

    if consumer == ConsumerState::Running {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                consumer: consumer.as_str(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                consumer: consumer.as_str(),
            }),
        )
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use notifier_runtime::{ConnectionManager, MetricsRecorder};
    use notifier_testing::InMemoryBroker;
    use std::sync::Arc;

    fn state(broker: &Arc<InMemoryBroker>) -> AppState {
        AppState::new(
            Arc::new(ConnectionManager::new(Arc::clone(broker) as _)),
            Arc::new(MetricsRecorder::new()),
        )
    }

    #[tokio::test]
    async fn test_health_is_always_ok() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, HealthResponse { status: "ok" });
    }

    #[tokio::test]
    async fn test_readiness_reports_state_until_running() {
        let broker = Arc::new(InMemoryBroker::new());
        let state = state(&broker);

        let (status, Json(body)) = readiness_check(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.consumer, "disconnected");

        state.connection.connect().await.unwrap();
        let (status, Json(body)) = readiness_check(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "not_ready");
        assert_eq!(body.consumer, "connected");
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_unavailable() {
        let broker = Arc::new(InMemoryBroker::new());
        let response = metrics(State(state(&broker))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
