//! HTTP server module for the notification service.
//!
//! This module provides the Axum-based HTTP server with:
//! - Application state management
//! - Liveness and readiness endpoints
//! - Prometheus scrape endpoint

pub mod health;
pub mod routes;
pub mod state;

pub use health::health_check;
pub use routes::build_router;
pub use state::AppState;
