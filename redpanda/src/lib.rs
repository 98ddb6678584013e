//! Kafka/Redpanda adapter for the notification dispatcher.
//!
//! This crate implements the [`BrokerConsumer`](notifier_core::broker::BrokerConsumer)
//! and [`TopicAdmin`](notifier_core::broker::TopicAdmin) traits from
//! `notifier-core` on top of rdkafka. Any Kafka-protocol broker works:
//! Apache Kafka, Redpanda, MSK.
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - Auto-commit is disabled
//! - The router calls [`acknowledge`](notifier_core::broker::BrokerConsumer::acknowledge)
//!   after the handler returns, which queues an async commit of `offset + 1`
//! - A crash between handling and commit redelivers the record
//! - New consumer groups start from the high-water mark (`latest`)
//!
//! # Example
//!
//! ```no_run
//! use notifier_redpanda::{KafkaConsumer, KafkaSettings, KafkaTopicAdmin};
//! use notifier_core::broker::BrokerConsumer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = KafkaSettings::builder()
//!     .brokers("localhost:9092")
//!     .group_id("notification-service-group")
//!     .client_id("notification-service")
//!     .build()?;
//!
//! let consumer = KafkaConsumer::new(settings.clone());
//! let admin = KafkaTopicAdmin::new(settings);
//! consumer.connect().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin;
mod consumer;

pub use admin::KafkaTopicAdmin;
pub use consumer::KafkaConsumer;

use notifier_core::broker::BrokerError;
use rdkafka::config::ClientConfig;
use std::time::Duration;

/// Connection settings shared by the consumer and the admin client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    /// Comma-separated bootstrap servers
    pub brokers: String,
    /// Consumer group
    pub group_id: String,
    /// Client id reported to the broker
    pub client_id: String,
    /// Socket setup and initial metadata timeout
    pub connection_timeout: Duration,
    /// Per-request and admin operation timeout
    pub request_timeout: Duration,
    /// Group session timeout
    pub session_timeout: Duration,
    /// Group heartbeat interval
    pub heartbeat_interval: Duration,
    /// Where a new group starts reading
    pub auto_offset_reset: String,
    /// Records fetched ahead of the consumption loop
    pub buffer_size: usize,
}

impl KafkaSettings {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> KafkaSettingsBuilder {
        KafkaSettingsBuilder::default()
    }

    /// Base client configuration: bootstrap servers, client id, timeouts.
    fn client_config(&self, client_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", client_id)
            .set(
                "socket.connection.setup.timeout.ms",
                millis(self.connection_timeout),
            )
            .set("socket.timeout.ms", millis(self.request_timeout));
        config
    }
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

/// Builder for [`KafkaSettings`].
///
/// # Example
///
/// ```no_run
/// use notifier_redpanda::KafkaSettings;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = KafkaSettings::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .session_timeout(Duration::from_secs(30))
///     .auto_offset_reset("earliest")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct KafkaSettingsBuilder {
    brokers: Option<String>,
    group_id: Option<String>,
    client_id: Option<String>,
    connection_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    heartbeat_interval: Option<Duration>,
    auto_offset_reset: Option<String>,
    buffer_size: Option<usize>,
}

impl KafkaSettingsBuilder {
    /// Set the bootstrap servers.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group.
    ///
    /// Default: `notification-service-group`
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the client id.
    ///
    /// Default: `notification-service`
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Default: 10 seconds
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Default: 30 seconds
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Default: 30 seconds
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Default: 3 seconds
    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Set the offset reset policy for new groups: `"latest"`, `"earliest"` or `"error"`.
    ///
    /// Default: `"latest"`
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the read-ahead buffer. Zero is raised to one.
    ///
    /// Default: 64
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Build the settings.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if no brokers were configured.
    pub fn build(self) -> Result<KafkaSettings, BrokerError> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| BrokerError::ConnectionFailed("Brokers not configured".to_string()))?;

        Ok(KafkaSettings {
            brokers,
            group_id: self
                .group_id
                .unwrap_or_else(|| "notification-service-group".to_string()),
            client_id: self
                .client_id
                .unwrap_or_else(|| "notification-service".to_string()),
            connection_timeout: self.connection_timeout.unwrap_or(Duration::from_secs(10)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(30)),
            heartbeat_interval: self.heartbeat_interval.unwrap_or(Duration::from_secs(3)),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
            buffer_size: self.buffer_size.unwrap_or(64).max(1),
        })
    }
}
