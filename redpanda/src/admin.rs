//! rdkafka-backed [`TopicAdmin`].

use crate::KafkaSettings;
use notifier_core::broker::{BrokerError, BrokerFuture, TopicAdmin};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Client = AdminClient<DefaultClientContext>;

/// Short-lived management connection used for topic provisioning.
pub struct KafkaTopicAdmin {
    settings: KafkaSettings,
    client: Mutex<Option<Arc<Client>>>,
}

impl KafkaTopicAdmin {
    /// Create an unconnected admin.
    #[must_use]
    pub const fn new(settings: KafkaSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Client>>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Result<Arc<Client>, BrokerError> {
        self.lock().clone().ok_or(BrokerError::NotConnected)
    }
}

impl TopicAdmin for KafkaTopicAdmin {
    fn connect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let mut slot = self.lock();
            if slot.is_none() {
                let client_id = format!("{}-admin", self.settings.client_id);
                let client: Client = self
                    .settings
                    .client_config(&client_id)
                    .create()
                    .map_err(|e| BrokerError::Admin(format!("Failed to create admin client: {e}")))?;
                *slot = Some(Arc::new(client));
            }
            Ok(())
        })
    }

    fn disconnect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let Some(client) = self.lock().take() else {
                return Ok(());
            };
            tokio::task::spawn_blocking(move || drop(client))
                .await
                .map_err(|e| BrokerError::Admin(format!("Admin client close failed: {e}")))
        })
    }

    fn list_topics(&self) -> BrokerFuture<'_, Vec<String>> {
        Box::pin(async move {
            let client = self.current()?;
            let timeout = self.settings.request_timeout;

            tokio::task::spawn_blocking(move || {
                client.inner().fetch_metadata(None, timeout).map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .map(|t| t.name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .await
            .map_err(|e| BrokerError::Admin(format!("Metadata task failed: {e}")))?
            .map_err(|e| BrokerError::Admin(format!("Failed to list topics: {e}")))
        })
    }

    fn create_topic(
        &self,
        topic: &str,
        partitions: i32,
        replication_factor: i32,
    ) -> BrokerFuture<'_, ()> {
        let topic = topic.to_string();

        Box::pin(async move {
            let client = self.current()?;
            let new_topic = NewTopic::new(
                &topic,
                partitions,
                TopicReplication::Fixed(replication_factor),
            );
            let options =
                AdminOptions::new().operation_timeout(Some(self.settings.request_timeout));

            let results = client
                .create_topics(&[new_topic], &options)
                .await
                .map_err(|e| BrokerError::Admin(format!("Failed to create topic {topic}: {e}")))?;

            for result in results {
                match result {
                    Ok(_) => {}
                    Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                        return Err(BrokerError::TopicAlreadyExists(name));
                    }
                    Err((name, code)) => {
                        return Err(BrokerError::Admin(format!(
                            "Failed to create topic {name}: {code}"
                        )));
                    }
                }
            }
            Ok(())
        })
    }
}
