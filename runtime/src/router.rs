//! Event router: provisions the topic, subscribes, and drives the consumption loop.
//!
//! # Start Sequence
//!
//! ```text
//! start()
//!   ├─ not connected? ──────────────► Err(NotConnected)
//!   ├─ already running? ────────────► warn, Ok(())
//!   ├─ 1. provision topic (never fails the start)
//!   ├─ 2. subscribe from the high-water mark      ──► state = Subscribed
//!   ├─ 3. spawn the consumption loop
//!   └─ 4.                                          ──► state = Running
//! ```
//!
//! # Consumption Loop
//!
//! One task, one record at a time. For each record the loop resolves a
//! handler from the `event-type` header, awaits it to completion (retries and
//! backoff included) and then acknowledges the record, whatever the handler
//! concluded. A stop request is only observed between records, so an in-flight
//! delivery always finishes.

use crate::connection::ConnectionManager;
use crate::handlers::HandlerRegistry;
use crate::metrics::ConsumerMetrics;
use crate::provisioner::TopicProvisioner;
use futures::StreamExt;
use notifier_core::broker::{BrokerConsumer, BrokerError, ConsumerState, MessageStream};
use notifier_core::message::InboundMessage;
use notifier_core::EVENT_TYPE_HEADER;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;

/// A spawned consumption loop.
struct RunningLoop {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Subscribes to one topic and routes its records to handlers.
pub struct EventRouter {
    topic: String,
    connection: Arc<ConnectionManager>,
    provisioner: TopicProvisioner,
    registry: Arc<HandlerRegistry>,
    current: Mutex<Option<RunningLoop>>,
    /// `true` while a consumption loop is alive
    running: watch::Sender<bool>,
}

impl EventRouter {
    /// Create a router for `topic`.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        connection: Arc<ConnectionManager>,
        provisioner: TopicProvisioner,
        registry: HandlerRegistry,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            topic: topic.into(),
            connection,
            provisioner,
            registry: Arc::new(registry),
            current: Mutex::new(None),
            running,
        }
    }

    /// The consumed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether a consumption loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Start consuming.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NotConnected`] if the session is not open
    /// - [`BrokerError::SubscriptionFailed`] (or another broker error) if the
    ///   subscription is rejected
    pub async fn start(&self) -> Result<(), BrokerError> {
        let mut current = self.current.lock().await;

        if self.is_running() {
            tracing::warn!(topic = %self.topic, "Kafka consumer already running");
            return Ok(());
        }

        if !self.connection.is_connected() {
            tracing::error!(topic = %self.topic, "Cannot start consumer: not connected");
            return Err(BrokerError::NotConnected);
        }

        self.provisioner.ensure_topic(&self.topic).await;

        let consumer = self.connection.consumer();
        let stream = consumer.subscribe(&self.topic).await.inspect_err(|e| {
            tracing::error!(topic = %self.topic, error = %e, "Failed to start Kafka consumer");
        })?;
        self.connection.advance(ConsumerState::Subscribed)?;
        tracing::info!(topic = %self.topic, "Subscribed to topic");

        let (stop_tx, stop_rx) = oneshot::channel();
        self.running.send_replace(true);
        let handle = tokio::spawn(consume(
            self.topic.clone(),
            stream,
            consumer,
            Arc::clone(&self.registry),
            stop_rx,
            self.running.clone(),
        ));

        if let Err(e) = self.connection.advance(ConsumerState::Running) {
            let _ = stop_tx.send(());
            let _ = handle.await;
            return Err(e);
        }

        *current = Some(RunningLoop {
            stop: stop_tx,
            handle,
        });
        tracing::info!(topic = %self.topic, "Kafka consumer service started");
        Ok(())
    }

    /// Stop the consumption loop after the in-flight record and wait for it.
    ///
    /// No-op if nothing is running. Does not close the broker session.
    pub async fn stop(&self) {
        let Some(running) = self.current.lock().await.take() else {
            return;
        };

        let _ = running.stop.send(());
        if let Err(e) = running.handle.await {
            tracing::error!(topic = %self.topic, error = %e, "Consumption loop panicked");
        }
    }

    /// Resolve once the consumption loop is no longer alive.
    ///
    /// Returns immediately if no loop is running.
    pub async fn stopped(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }
}

/// Marks the loop as stopped however the task ends.
struct RunningGuard(watch::Sender<bool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

async fn consume(
    topic: String,
    mut stream: MessageStream,
    consumer: Arc<dyn BrokerConsumer>,
    registry: Arc<HandlerRegistry>,
    mut stop: oneshot::Receiver<()>,
    running: watch::Sender<bool>,
) {
    let _guard = RunningGuard(running);
    tracing::info!(topic = %topic, "Consumption loop started");

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop => {
                tracing::info!(topic = %topic, "Consumption loop received stop signal");
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(message)) => dispatch(&message, consumer.as_ref(), &registry).await,
            Some(Err(e)) => {
                tracing::error!(topic = %topic, error = %e, "Error receiving message from stream");
            }
            None => {
                tracing::warn!(topic = %topic, "Message stream ended");
                break;
            }
        }
    }

    tracing::info!(topic = %topic, "Consumption loop stopped");
}

async fn dispatch(message: &InboundMessage, consumer: &dyn BrokerConsumer, registry: &HandlerRegistry) {
    ConsumerMetrics::record_received();
    tracing::debug!(
        topic = %message.topic,
        partition = message.partition,
        offset = message.offset,
        key = ?message.key_lossy(),
        "Received message"
    );

    let handler = registry.resolve(message.header(EVENT_TYPE_HEADER));
    let started = Instant::now();
    if let Err(e) = handler.handle(message).await {
        tracing::error!(
            handler = handler.name(),
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "Handler returned an error"
        );
    }
    ConsumerMetrics::record_handled(started.elapsed());

    // The offset advances whatever the handler concluded
    if let Err(e) = consumer.acknowledge(message) {
        ConsumerMetrics::record_commit_error();
        tracing::warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            error = %e,
            "Failed to commit offset (message may be redelivered)"
        );
    }
}
