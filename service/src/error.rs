//! Error types for the service edge.

use crate::config::ConfigError;
use notifier_core::broker::BrokerError;
use notifier_mailer::DeliveryError;
use notifier_runtime::MetricsError;
use thiserror::Error;

/// Errors raised while wiring or running the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Invalid environment
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Broker client could not be built or used
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// SMTP backend could not be built
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Prometheus recorder could not be installed
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// Listener bind or serve failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for service wiring.
pub type Result<T> = std::result::Result<T, ServiceError>;
