//! Application state for the HTTP server.

use notifier_runtime::{ConnectionManager, MetricsRecorder};
use std::sync::Arc;

/// Shared state handed to every HTTP handler.
///
/// Cloned per request; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Broker session, read for readiness
    pub connection: Arc<ConnectionManager>,

    /// Installed Prometheus recorder
    pub metrics: Arc<MetricsRecorder>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(connection: Arc<ConnectionManager>, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            connection,
            metrics,
        }
    }
}
