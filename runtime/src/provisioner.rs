//! Idempotent topic provisioning.
//!
//! Check-then-create is not atomic across clients, so a
//! [`BrokerError::TopicAlreadyExists`] from the create call counts as success.
//! Every other failure is logged and swallowed: the subscribe that follows
//! fails loudly if the topic really is missing.

use notifier_core::broker::{BrokerError, TopicAdmin};
use std::sync::Arc;

/// Partition count for provisioned topics.
pub const DEFAULT_PARTITIONS: i32 = 3;

/// Replication factor for provisioned topics.
pub const DEFAULT_REPLICATION_FACTOR: i32 = 1;

/// What a provisioning run concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The topic was listed before any create call
    AlreadyExisted,
    /// This run created the topic
    Created,
    /// Another client created it between our list and create
    CreatedConcurrently,
    /// Provisioning failed; the subscribe attempt proceeds anyway
    Failed(BrokerError),
}

impl ProvisionOutcome {
    /// Whether the topic is known to exist afterwards.
    #[must_use]
    pub const fn topic_exists(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Ensures a topic exists before the router subscribes to it.
pub struct TopicProvisioner {
    admin: Arc<dyn TopicAdmin>,
    partitions: i32,
    replication_factor: i32,
}

impl TopicProvisioner {
    /// Provisioner creating topics with 3 partitions and replication factor 1.
    #[must_use]
    pub fn new(admin: Arc<dyn TopicAdmin>) -> Self {
        Self {
            admin,
            partitions: DEFAULT_PARTITIONS,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }

    /// Override the partition count.
    #[must_use]
    pub const fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Override the replication factor.
    #[must_use]
    pub const fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Make sure `topic` exists, creating it if absent.
    ///
    /// Opens one management connection and always closes it, whatever the
    /// outcome. Never returns an error; the outcome is reported instead.
    pub async fn ensure_topic(&self, topic: &str) -> ProvisionOutcome {
        let outcome = match self.admin.connect().await {
            Ok(()) => {
                tracing::debug!("Connected to Kafka admin client");
                self.list_then_create(topic).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.admin.disconnect().await {
            tracing::warn!(error = %e, "Failed to close Kafka admin client");
        } else {
            tracing::debug!("Disconnected from Kafka admin client");
        }

        match outcome {
            Ok(outcome) => outcome,
            Err(BrokerError::TopicAlreadyExists(_)) => {
                tracing::info!(topic = %topic, "Topic already exists");
                ProvisionOutcome::CreatedConcurrently
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Failed to ensure topic exists");
                ProvisionOutcome::Failed(e)
            }
        }
    }

    async fn list_then_create(&self, topic: &str) -> Result<ProvisionOutcome, BrokerError> {
        let topics = self.admin.list_topics().await?;

        if topics.iter().any(|t| t == topic) {
            tracing::info!(topic = %topic, "Topic already exists");
            return Ok(ProvisionOutcome::AlreadyExisted);
        }

        tracing::info!(
            topic = %topic,
            partitions = self.partitions,
            replication_factor = self.replication_factor,
            "Topic does not exist, creating"
        );
        self.admin
            .create_topic(topic, self.partitions, self.replication_factor)
            .await?;
        tracing::info!(topic = %topic, "Topic created successfully");

        Ok(ProvisionOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifier_core::broker::BrokerFuture;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Admin whose create call always reports a race, or a hard failure.
    struct RacingAdmin {
        create_error: BrokerError,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        created: Mutex<Vec<(String, i32, i32)>>,
    }

    impl RacingAdmin {
        fn new(create_error: BrokerError) -> Self {
            Self {
                create_error,
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    impl TopicAdmin for RacingAdmin {
        fn connect(&self) -> BrokerFuture<'_, ()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn disconnect(&self) -> BrokerFuture<'_, ()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn list_topics(&self) -> BrokerFuture<'_, Vec<String>> {
            Box::pin(async { Ok(vec!["other".to_string()]) })
        }

        fn create_topic(
            &self,
            topic: &str,
            partitions: i32,
            replication_factor: i32,
        ) -> BrokerFuture<'_, ()> {
            if let Ok(mut created) = self.created.lock() {
                created.push((topic.to_string(), partitions, replication_factor));
            }
            let err = self.create_error.clone();
            Box::pin(async move { Err(err) })
        }
    }

    #[tokio::test]
    async fn test_already_exists_error_is_success() {
        let admin = Arc::new(RacingAdmin::new(BrokerError::TopicAlreadyExists(
            "auth-events".to_string(),
        )));
        let provisioner = TopicProvisioner::new(Arc::clone(&admin) as Arc<dyn TopicAdmin>);

        let outcome = provisioner.ensure_topic("auth-events").await;

        assert_eq!(outcome, ProvisionOutcome::CreatedConcurrently);
        assert!(outcome.topic_exists());
        assert_eq!(admin.connects.load(Ordering::SeqCst), 1);
        assert_eq!(admin.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_reported_not_raised() {
        let admin = Arc::new(RacingAdmin::new(BrokerError::Admin(
            "not authorized".to_string(),
        )));
        let provisioner = TopicProvisioner::new(Arc::clone(&admin) as Arc<dyn TopicAdmin>)
            .with_partitions(6)
            .with_replication_factor(2);

        let outcome = provisioner.ensure_topic("auth-events").await;

        assert!(matches!(outcome, ProvisionOutcome::Failed(BrokerError::Admin(_))));
        assert_eq!(admin.disconnects.load(Ordering::SeqCst), 1);
        let created = admin.created.lock().map(|c| c.clone()).unwrap_or_default();
        assert_eq!(created, vec![("auth-events".to_string(), 6, 2)]);
    }
}
