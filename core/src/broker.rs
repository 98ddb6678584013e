//! Broker abstraction for the consumption pipeline.
//!
//! Two traits separate the pipeline from the Kafka client:
//!
//! - [`BrokerConsumer`]: the long-lived consumer session (connect, subscribe,
//!   acknowledge, disconnect)
//! - [`TopicAdmin`]: a short-lived management connection used to provision
//!   topics before subscribing
//!
//! # Delivery Semantics
//!
//! ```text
//! subscribe(topic) ──► MessageStream ──► handler ──► acknowledge(message)
//!                                          │
//!                                          └── success or failure, the offset advances
//! ```
//!
//! Acknowledgement happens after the handler returns, independent of the
//! logical outcome. Redelivery only happens if the process dies between the
//! handler call and the commit.
//!
//! # Implementations
//!
//! - `KafkaConsumer` / `KafkaTopicAdmin` in `notifier-redpanda` - production
//! - `InMemoryBroker` / `InMemoryTopicAdmin` in `notifier-testing` - tests
//!
//! # Dyn Compatibility
//!
//! Both traits return `Pin<Box<dyn Future>>` instead of using `async fn` so
//! they can be held as `Arc<dyn BrokerConsumer>` by the connection manager and
//! the router.

use crate::message::InboundMessage;
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during broker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Failed to open a session with the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation required a connected session
    #[error("Consumer is not connected")]
    NotConnected,

    /// Failed to subscribe to a topic
    #[error("Subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Topic creation raced with another creator
    #[error("Topic already exists: {0}")]
    TopicAlreadyExists(String),

    /// Management (admin) operation failed
    #[error("Topic admin error: {0}")]
    Admin(String),

    /// Failed to commit a consumed offset
    #[error("Commit failed for {topic}/{partition}@{offset}: {reason}")]
    CommitFailed {
        /// Topic of the record
        topic: String,
        /// Partition of the record
        partition: i32,
        /// Offset of the record
        offset: i64,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error while consuming
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Lifecycle of the process-wide consumer.
///
/// Transitions are strictly forward, except that a disconnect resets to
/// [`ConsumerState::Disconnected`] from anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConsumerState {
    /// No session open
    #[default]
    Disconnected,
    /// Session open, no subscription
    Connected,
    /// Subscribed to the topic, loop not yet started
    Subscribed,
    /// Consumption loop running
    Running,
}

impl ConsumerState {
    /// Lowercase name used in logs and the readiness endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Subscribed => "subscribed",
            Self::Running => "running",
        }
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Whether moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next == Self::Disconnected || next > self
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream of records from a subscription.
///
/// Items are `Err` for transport-level failures; the stream keeps going after
/// an error and ends only when the session is torn down.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, BrokerError>> + Send>>;

/// Boxed future returned by the broker traits.
pub type BrokerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BrokerError>> + Send + 'a>>;

/// A consumer-group session with the broker.
///
/// Implementations must be `Send + Sync`; the connection manager and the
/// router share one instance behind an `Arc`.
pub trait BrokerConsumer: Send + Sync {
    /// Open the session.
    ///
    /// Called by the connection manager only while disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if no broker can be reached.
    fn connect(&self) -> BrokerFuture<'_, ()>;

    /// Tear the session down, ending any active [`MessageStream`].
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails; callers log and ignore it.
    fn disconnect(&self) -> BrokerFuture<'_, ()>;

    /// Subscribe to `topic`, starting at the current high-water mark for
    /// partitions without a committed offset.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotConnected`] without a session and
    /// [`BrokerError::SubscriptionFailed`] if the broker rejects the subscription.
    fn subscribe(&self, topic: &str) -> BrokerFuture<'_, MessageStream>;

    /// Mark `message` as processed so its offset is committed.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::CommitFailed`] if the commit cannot be queued.
    fn acknowledge(&self, message: &InboundMessage) -> Result<(), BrokerError>;
}

/// A management connection used for topic provisioning.
///
/// The provisioner calls [`connect`](Self::connect) and
/// [`disconnect`](Self::disconnect) exactly once per provisioning run.
pub trait TopicAdmin: Send + Sync {
    /// Open the management connection.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if it cannot be opened.
    fn connect(&self) -> BrokerFuture<'_, ()>;

    /// Close the management connection. Closing an unopened connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails.
    fn disconnect(&self) -> BrokerFuture<'_, ()>;

    /// Names of all topics known to the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Admin`] if metadata cannot be fetched.
    fn list_topics(&self) -> BrokerFuture<'_, Vec<String>>;

    /// Create `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::TopicAlreadyExists`] if another client created
    /// it first, and [`BrokerError::Admin`] for any other failure.
    fn create_topic(
        &self,
        topic: &str,
        partitions: i32,
        replication_factor: i32,
    ) -> BrokerFuture<'_, ()>;
}
