//! Application wiring and the bootstrap supervisor.
//!
//! [`NotificationApp`] owns the connection manager and the event router. Its
//! [`supervise`](NotificationApp::supervise) task keeps the consumer alive:
//!
//! ```text
//! loop
//!   ├─ connect() + router.start()
//!   │    ├─ Ok  ──► wait for shutdown or for the loop to end
//!   │    │            └─ loop ended ──► disconnect, fall through
//!   │    └─ Err ──► warn with attempt number
//!   └─ sleep 5s
//! ```
//!
//! Every await races the shutdown broadcast, so a signal during a connect
//! attempt or a backoff sleep ends the task promptly.

use crate::shutdown::ShutdownHandler;
use async_trait::async_trait;
use notifier_core::broker::{BrokerConsumer, BrokerError, TopicAdmin};
use notifier_runtime::{ConnectionManager, EventRouter, HandlerRegistry, TopicProvisioner};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Pause between broker connection attempts.
pub const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// The consumer side of the service.
pub struct NotificationApp {
    connection: Arc<ConnectionManager>,
    router: EventRouter,
    retry_delay: Duration,
}

impl NotificationApp {
    /// Wire a router for `topic` over `consumer`, provisioning through `admin`.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        consumer: Arc<dyn BrokerConsumer>,
        admin: Arc<dyn TopicAdmin>,
        registry: HandlerRegistry,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(consumer));
        let router = EventRouter::new(
            topic,
            Arc::clone(&connection),
            TopicProvisioner::new(admin),
            registry,
        );

        Self {
            connection,
            router,
            retry_delay: BOOTSTRAP_RETRY_DELAY,
        }
    }

    /// Override the pause between connection attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// The shared connection manager.
    #[must_use]
    pub const fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// The event router.
    #[must_use]
    pub const fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Connect, then start the router.
    ///
    /// # Errors
    ///
    /// Returns the first broker error from either step.
    pub async fn connect_and_start(&self) -> Result<(), BrokerError> {
        self.connection.connect().await?;
        self.router.start().await
    }

    /// Spawn [`supervise`](Self::supervise) on the runtime.
    #[must_use]
    pub fn spawn_bootstrap(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let app = Arc::clone(self);
        tokio::spawn(async move { app.supervise(shutdown).await })
    }

    /// Keep the consumer running until shutdown.
    ///
    /// Returns when the shutdown broadcast fires or its sender is dropped.
    pub async fn supervise(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let started = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                result = self.connect_and_start() => result,
            };

            match started {
                Ok(()) => {
                    info!(attempt, topic = %self.router.topic(), "Kafka consumer is running");
                    attempt = 0;

                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        () = self.router.stopped() => {
                            warn!(topic = %self.router.topic(), "Consumption loop ended, reconnecting");
                            self.connection.disconnect().await;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        retry_in = ?self.retry_delay,
                        "Failed to connect to Kafka (attempt {attempt}), retrying in {}s",
                        self.retry_delay.as_secs()
                    );
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!("Bootstrap supervisor stopped");
    }

    /// Stop consuming and close the session.
    pub async fn shutdown(&self) {
        self.router.stop().await;
        self.connection.disconnect().await;
    }
}

/// Shuts the consumer down as part of process shutdown.
pub struct ConsumerShutdown {
    app: Arc<NotificationApp>,
}

impl ConsumerShutdown {
    /// Wrap `app`.
    #[must_use]
    pub const fn new(app: Arc<NotificationApp>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl ShutdownHandler for ConsumerShutdown {
    fn name(&self) -> &str {
        "kafka-consumer"
    }

    async fn shutdown(&self) -> Result<(), String> {
        self.app.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use notifier_core::broker::ConsumerState;
    use notifier_testing::{InMemoryBroker, InMemoryTopicAdmin};
    use tokio::time::Instant;

    fn app(broker: &Arc<InMemoryBroker>, admin: &Arc<InMemoryTopicAdmin>) -> Arc<NotificationApp> {
        Arc::new(NotificationApp::new(
            "auth-events",
            Arc::clone(broker) as _,
            Arc::clone(admin) as _,
            HandlerRegistry::new(),
        ))
    }

    async fn wait_for_state(app: &NotificationApp, state: ConsumerState) {
        let mut rx = app.connection().watch_state();
        rx.wait_for(|current| *current == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_retries_every_five_seconds() {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        broker.fail_connects(2);
        let app = app(&broker, &admin);
        let (tx, rx) = broadcast::channel(1);

        let started = Instant::now();
        let task = app.spawn_bootstrap(rx);
        wait_for_state(&app, ConsumerState::Running).await;

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(broker.connect_calls(), 3);
        assert_eq!(broker.subscriptions(), vec!["auth-events".to_string()]);
        assert_eq!(admin.topics(), vec!["auth-events".to_string()]);

        tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        broker.fail_connects(usize::MAX);
        let app = app(&broker, &admin);
        let (tx, rx) = broadcast::channel(1);

        let task = app.spawn_bootstrap(rx);
        tokio::time::sleep(Duration::from_secs(12)).await;
        tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(broker.connect_calls(), 3);
        assert_eq!(app.connection().state(), ConsumerState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_ends_supervisor() {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        broker.fail_connects(usize::MAX);
        let app = app(&broker, &admin);
        let (tx, rx) = broadcast::channel::<()>(1);

        let task = app.spawn_bootstrap(rx);
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_loop_ends() {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        let app = app(&broker, &admin);
        let (tx, rx) = broadcast::channel(1);

        let task = app.spawn_bootstrap(rx);
        wait_for_state(&app, ConsumerState::Running).await;

        // Session dropped underneath the service
        broker.disconnect().await.unwrap();
        wait_for_state(&app, ConsumerState::Disconnected).await;
        wait_for_state(&app, ConsumerState::Running).await;

        assert_eq!(broker.connect_calls(), 2);
        assert_eq!(broker.subscriptions().len(), 2);

        tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_handler_stops_and_disconnects() {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        let app = app(&broker, &admin);

        app.connect_and_start().await.unwrap();
        assert!(app.router().is_running());

        ConsumerShutdown::new(Arc::clone(&app)).shutdown().await.unwrap();

        assert!(!app.router().is_running());
        assert_eq!(app.connection().state(), ConsumerState::Disconnected);
        assert!(!broker.is_connected());

        // Second shutdown is a no-op
        app.shutdown().await;
        assert_eq!(broker.disconnect_calls(), 1);
    }
}
