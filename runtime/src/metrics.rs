//! Prometheus metrics for the consumption pipeline.
//!
//! The offset advances whether or not a message was delivered, so losses are
//! only visible through these counters:
//!
//! - `notifier_messages_discarded_total{reason}`: malformed or invalid records
//! - `notifier_deliveries_exhausted_total`: deliveries that ran out of attempts
//!
//! # Example
//!
//! ```rust,no_run
//! use notifier_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Later, from the HTTP handler
//! let body = recorder.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its exposition text.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the bucket configuration is rejected
    /// and [`MetricsError::Install`] if installing fails for any reason other
    /// than a recorder already being present.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this recorder was never installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "notifier_messages_received_total",
        "Total number of records read from the broker"
    );
    describe_counter!(
        "notifier_messages_ignored_total",
        "Records whose routing tag has no registered handler"
    );
    describe_counter!(
        "notifier_messages_discarded_total",
        "Records dropped as malformed, invalid, or of the wrong type"
    );
    describe_counter!(
        "notifier_commit_errors_total",
        "Offset commits that could not be queued"
    );
    describe_histogram!(
        "notifier_message_handle_duration_seconds",
        "Time spent in a handler, including retries and backoff"
    );

    describe_counter!(
        "notifier_deliveries_succeeded_total",
        "OTP emails accepted by the SMTP relay"
    );
    describe_counter!(
        "notifier_deliveries_exhausted_total",
        "OTP emails abandoned after all attempts failed"
    );
    describe_counter!(
        "notifier_delivery_attempts_total",
        "Individual delivery attempts, including retries"
    );
    describe_counter!(
        "notifier_retry_exhausted_total",
        "Retried operations that ran out of attempts"
    );
}

/// Why a record was dropped without delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No value
    Empty,
    /// Value did not decode
    Malformed,
    /// Envelope type did not match the handler
    WrongEventType,
    /// Payload failed validation
    Invalid,
}

impl DiscardReason {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Malformed => "malformed",
            Self::WrongEventType => "wrong_event_type",
            Self::Invalid => "invalid",
        }
    }
}

/// Consumer-side metrics recorder.
pub struct ConsumerMetrics;

impl ConsumerMetrics {
    /// Record a record read from the broker.
    pub fn record_received() {
        counter!("notifier_messages_received_total").increment(1);
    }

    /// Record a record with no handler for its tag.
    pub fn record_ignored() {
        counter!("notifier_messages_ignored_total").increment(1);
    }

    /// Record a dropped record.
    pub fn record_discarded(reason: DiscardReason) {
        counter!("notifier_messages_discarded_total", "reason" => reason.as_str()).increment(1);
    }

    /// Record a failed offset commit.
    pub fn record_commit_error() {
        counter!("notifier_commit_errors_total").increment(1);
    }

    /// Record time spent in a handler.
    pub fn record_handled(duration: Duration) {
        histogram!("notifier_message_handle_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Delivery metrics recorder.
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record an accepted email.
    pub fn record_success() {
        counter!("notifier_deliveries_succeeded_total").increment(1);
    }

    /// Record an abandoned email.
    pub fn record_exhausted() {
        counter!("notifier_deliveries_exhausted_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record one attempt.
    pub fn record_attempt() {
        counter!("notifier_delivery_attempts_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("notifier_retry_exhausted_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_starts_uninstalled() {
        let recorder = MetricsRecorder::new();
        assert!(recorder.render().is_none());
    }

    #[test]
    fn test_install_is_tolerant_of_repeat_calls() {
        let mut first = MetricsRecorder::new();
        let mut second = MetricsRecorder::new();

        assert!(first.install().is_ok());
        assert!(second.install().is_ok());
    }

    #[test]
    fn test_discard_reason_labels() {
        assert_eq!(DiscardReason::Malformed.as_str(), "malformed");
        assert_eq!(DiscardReason::WrongEventType.as_str(), "wrong_event_type");
    }

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        ConsumerMetrics::record_received();
        ConsumerMetrics::record_discarded(DiscardReason::Invalid);
        DeliveryMetrics::record_exhausted();
        RetryMetrics::record_attempt();
    }
}
