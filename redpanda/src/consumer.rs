//! rdkafka-backed [`BrokerConsumer`].

use crate::{KafkaSettings, millis};
use notifier_core::broker::{BrokerConsumer, BrokerError, BrokerFuture, MessageStream};
use notifier_core::message::InboundMessage;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// An open consumer session.
struct Session {
    consumer: Arc<StreamConsumer>,
    forwarder: Option<JoinHandle<()>>,
}

/// Kafka consumer with manual offset commits.
///
/// `connect` creates the group member and checks the cluster answers a
/// metadata request; `subscribe` spawns a task that owns the rdkafka stream
/// and forwards detached records over a bounded channel.
pub struct KafkaConsumer {
    settings: KafkaSettings,
    session: Mutex<Option<Session>>,
}

impl KafkaConsumer {
    /// Create an unconnected consumer.
    #[must_use]
    pub const fn new(settings: KafkaSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    /// The settings this consumer was built with.
    #[must_use]
    pub const fn settings(&self) -> &KafkaSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Result<Arc<StreamConsumer>, BrokerError> {
        self.lock()
            .as_ref()
            .map(|s| Arc::clone(&s.consumer))
            .ok_or(BrokerError::NotConnected)
    }

    fn create_consumer(&self) -> Result<StreamConsumer, BrokerError> {
        let settings = &self.settings;
        settings
            .client_config(&settings.client_id)
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &settings.auto_offset_reset)
            .set("session.timeout.ms", millis(settings.session_timeout))
            .set("heartbeat.interval.ms", millis(settings.heartbeat_interval))
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BrokerError::ConnectionFailed(format!("Failed to create consumer: {e}")))
    }
}

impl BrokerConsumer for KafkaConsumer {
    fn connect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            if self.lock().is_some() {
                return Ok(());
            }

            let consumer = Arc::new(self.create_consumer()?);

            // rdkafka connects lazily; a metadata round trip proves the cluster is reachable
            let probe = Arc::clone(&consumer);
            let timeout = self.settings.connection_timeout;
            let broker_count = tokio::task::spawn_blocking(move || {
                probe
                    .fetch_metadata(None, timeout)
                    .map(|metadata| metadata.brokers().len())
            })
            .await
            .map_err(|e| BrokerError::ConnectionFailed(format!("Metadata task failed: {e}")))?
            .map_err(|e| BrokerError::ConnectionFailed(e.to_string()))?;

            tracing::info!(
                brokers = %self.settings.brokers,
                group_id = %self.settings.group_id,
                client_id = %self.settings.client_id,
                broker_count,
                "Kafka consumer session opened"
            );

            *self.lock() = Some(Session {
                consumer,
                forwarder: None,
            });
            Ok(())
        })
    }

    fn disconnect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let Some(session) = self.lock().take() else {
                return Ok(());
            };

            if let Some(forwarder) = session.forwarder {
                forwarder.abort();
                let _ = forwarder.await;
            }
            session.consumer.unsubscribe();

            // Dropping the last handle leaves the group, which blocks on the broker
            let consumer = session.consumer;
            tokio::task::spawn_blocking(move || drop(consumer))
                .await
                .map_err(|e| BrokerError::TransportError(format!("Consumer close failed: {e}")))?;

            tracing::debug!("Kafka consumer session closed");
            Ok(())
        })
    }

    fn subscribe(&self, topic: &str) -> BrokerFuture<'_, MessageStream> {
        let topic = topic.to_string();
        let buffer_size = self.settings.buffer_size;

        Box::pin(async move {
            let consumer = self.current()?;

            consumer
                .subscribe(&[topic.as_str()])
                .map_err(|e| BrokerError::SubscriptionFailed {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })?;

            tracing::info!(
                topic = %topic,
                group_id = %self.settings.group_id,
                auto_offset_reset = %self.settings.auto_offset_reset,
                manual_commit = true,
                "Subscribed to topic"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);
            let forwarder = tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();
                while let Some(next) = stream.next().await {
                    let item = next
                        .map(|message| detach(&message))
                        .map_err(|e| BrokerError::TransportError(format!("Failed to receive message: {e}")));
                    if tx.send(item).await.is_err() {
                        tracing::debug!("Channel receiver dropped, exiting consumer task");
                        break;
                    }
                }
                tracing::debug!("Consumer task exiting");
            });

            if let Some(session) = self.lock().as_mut() {
                if let Some(previous) = session.forwarder.replace(forwarder) {
                    previous.abort();
                }
            } else {
                forwarder.abort();
                return Err(BrokerError::NotConnected);
            }

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }

    fn acknowledge(&self, message: &InboundMessage) -> Result<(), BrokerError> {
        let consumer = self.current()?;
        let commit_failed = |reason: String| BrokerError::CommitFailed {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason,
        };

        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .map_err(|e| commit_failed(e.to_string()))?;

        consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| commit_failed(e.to_string()))
    }
}

/// Copy an rdkafka record into an owned [`InboundMessage`].
///
/// Header values that are not UTF-8 are decoded lossily; headers without a
/// value are skipped.
pub(crate) fn detach<M: Message>(message: &M) -> InboundMessage {
    let mut inbound = InboundMessage::new(message.topic(), message.partition(), message.offset());
    inbound.key = message.key().map(<[u8]>::to_vec);
    inbound.payload = message.payload().map(<[u8]>::to_vec);

    if let Some(headers) = message.headers() {
        for header in headers.iter() {
            if let Some(value) = header.value {
                inbound
                    .headers
                    .insert(header.key.to_string(), String::from_utf8_lossy(value).into_owned());
            }
        }
    }

    inbound
}
