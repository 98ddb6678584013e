//! # Notifier Runtime
//!
//! Drives the consumption side of the notification dispatcher.
//!
//! ## Core Components
//!
//! - **[`ConnectionManager`]**: opens and closes the broker session, owns the
//!   lifecycle state
//! - **[`TopicProvisioner`]**: creates the consumed topic if it is missing
//! - **[`EventRouter`]**: subscribes and runs the sequential consumption loop
//! - **[`HandlerRegistry`]**: maps `event-type` header values to handlers
//! - **[`retry_with_backoff`]**: bounded exponential retry for side effects
//!
//! ## Example
//!
//! ```ignore
//! use notifier_runtime::{ConnectionManager, EventRouter, HandlerRegistry, TopicProvisioner};
//!
//! let connection = Arc::new(ConnectionManager::new(consumer));
//! let registry = HandlerRegistry::new().register("auth.otp.generated", otp_handler);
//! let router = EventRouter::new("auth-events", Arc::clone(&connection), TopicProvisioner::new(admin), registry);
//!
//! connection.connect().await?;
//! router.start().await?;
//! ```

/// Broker session lifecycle
pub mod connection;

/// Handler trait and routing-tag registry
pub mod handlers;

/// Prometheus metrics for observability
pub mod metrics;

/// Idempotent topic creation
pub mod provisioner;

/// Retry logic with exponential backoff
pub mod retry;

/// Subscription and consumption loop
pub mod router;

pub use connection::ConnectionManager;
pub use handlers::{HandlerError, HandlerRegistry, IgnoreHandler, MessageHandler};
pub use metrics::{DiscardReason, MetricsError, MetricsRecorder};
pub use provisioner::{ProvisionOutcome, TopicProvisioner};
pub use retry::{RetryPolicy, RetryPolicyBuilder, retry_with_backoff};
pub use router::EventRouter;
