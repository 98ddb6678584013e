//! Broker session lifecycle.
//!
//! [`ConnectionManager`] owns the process-wide [`ConsumerState`] and is the
//! only component that opens or closes the consumer session. The router reads
//! the state and asks the manager to advance it to `Subscribed`/`Running`.
//!
//! ```text
//!              connect() ok                 subscribe            loop started
//! Disconnected ────────────► Connected ────────────► Subscribed ────────────► Running
//!      ▲                                                                        │
//!      └───────────────────────────── disconnect() ─────────────────────────────┘
//! ```
//!
//! Both [`connect`](ConnectionManager::connect) and
//! [`disconnect`](ConnectionManager::disconnect) are idempotent. The state lock
//! is held across the broker call so concurrent callers can never open two
//! sessions.

use notifier_core::broker::{BrokerConsumer, BrokerError, ConsumerState};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Owns the consumer session and its lifecycle state.
pub struct ConnectionManager {
    consumer: Arc<dyn BrokerConsumer>,
    /// Serializes connect/disconnect so at most one session is ever open
    lifecycle: Mutex<()>,
    state: watch::Sender<ConsumerState>,
}

impl ConnectionManager {
    /// Wrap a consumer that has not been connected yet.
    #[must_use]
    pub fn new(consumer: Arc<dyn BrokerConsumer>) -> Self {
        let (state, _) = watch::channel(ConsumerState::Disconnected);
        Self {
            consumer,
            lifecycle: Mutex::new(()),
            state,
        }
    }

    /// The managed consumer.
    #[must_use]
    pub fn consumer(&self) -> Arc<dyn BrokerConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Open the session unless one is already open.
    ///
    /// # Errors
    ///
    /// Returns the broker's error if the session cannot be opened. The state
    /// stays `Disconnected`; retrying is the caller's job.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        let _guard = self.lifecycle.lock().await;

        if self.is_connected() {
            tracing::debug!(state = %self.state(), "Consumer already connected");
            return Ok(());
        }

        match self.consumer.connect().await {
            Ok(()) => {
                self.state.send_replace(ConsumerState::Connected);
                tracing::info!("Kafka consumer connected");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect Kafka consumer");
                Err(e)
            }
        }
    }

    /// Close the session if one is open.
    ///
    /// Teardown failures are logged and swallowed; the state always ends as
    /// `Disconnected`.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;

        if !self.is_connected() {
            tracing::debug!("Consumer already disconnected");
            return;
        }

        if let Err(e) = self.consumer.disconnect().await {
            tracing::error!(error = %e, "Error disconnecting Kafka consumer");
        } else {
            tracing::info!("Kafka consumer disconnected");
        }
        self.state.send_replace(ConsumerState::Disconnected);
    }

    /// Move forward to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotConnected`] if no session is open, which also
    /// covers a disconnect racing with the router.
    pub(crate) fn advance(&self, next: ConsumerState) -> Result<(), BrokerError> {
        let mut result = Ok(());
        self.state.send_if_modified(|current| {
            if !current.is_connected() {
                result = Err(BrokerError::NotConnected);
                false
            } else if current.can_transition_to(next) {
                tracing::debug!(from = %current, to = %next, "Consumer state changed");
                *current = next;
                true
            } else {
                false
            }
        });
        result
    }
}
