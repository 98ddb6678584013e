//! In-memory broker fakes.
//!
//! [`InMemoryBroker`] behaves like a single-topic consumer group member:
//! records pushed before `subscribe` are buffered, records pushed afterwards
//! flow straight into the live stream, and `disconnect` ends that stream.
//! Every acknowledgement is recorded so tests can assert the offset always
//! advances.

use notifier_core::broker::{BrokerConsumer, BrokerError, BrokerFuture, MessageStream, TopicAdmin};
use notifier_core::message::InboundMessage;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Item = Result<InboundMessage, BrokerError>;

#[derive(Default)]
struct BrokerState {
    connected: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    failing_connects: usize,
    failing_subscribe: Option<String>,
    subscriptions: Vec<String>,
    pending: Vec<Item>,
    live: Option<mpsc::UnboundedSender<Item>>,
    acknowledged: Vec<InboundMessage>,
}

/// Scriptable in-memory consumer.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl InMemoryBroker {
    /// Broker with no records that accepts every connect.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    /// Make the next subscribe fail with `reason`.
    pub fn fail_next_subscribe(&self, reason: impl Into<String>) {
        self.lock().failing_subscribe = Some(reason.into());
    }

    /// Deliver a record to the subscriber, or buffer it until one exists.
    pub fn push(&self, message: InboundMessage) {
        self.push_item(Ok(message));
    }

    /// Inject a stream-level error.
    pub fn push_error(&self, error: BrokerError) {
        self.push_item(Err(error));
    }

    fn push_item(&self, item: Item) {
        let mut state = self.lock();
        let item = match state.live.as_ref() {
            Some(tx) => match tx.send(item) {
                Ok(()) => return,
                Err(mpsc::error::SendError(item)) => item,
            },
            None => item,
        };
        state.pending.push(item);
    }

    /// Records acknowledged so far, in order.
    #[must_use]
    pub fn acknowledged(&self) -> Vec<InboundMessage> {
        self.lock().acknowledged.clone()
    }

    /// Topics subscribed to so far, one entry per subscribe call.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    /// Number of connect attempts, failed ones included.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Number of disconnect calls.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

impl BrokerConsumer for InMemoryBroker {
    fn connect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.connect_calls += 1;
            if state.failing_connects > 0 {
                state.failing_connects -= 1;
                return Err(BrokerError::ConnectionFailed(
                    "connect ECONNREFUSED 127.0.0.1:9092".to_string(),
                ));
            }
            state.connected = true;
            Ok(())
        })
    }

    fn disconnect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.disconnect_calls += 1;
            state.connected = false;
            state.live = None;
            Ok(())
        })
    }

    fn subscribe(&self, topic: &str) -> BrokerFuture<'_, MessageStream> {
        let topic = topic.to_string();
        Box::pin(async move {
            let mut state = self.lock();
            if !state.connected {
                return Err(BrokerError::NotConnected);
            }
            if let Some(reason) = state.failing_subscribe.take() {
                return Err(BrokerError::SubscriptionFailed { topic, reason });
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            for item in state.pending.drain(..) {
                let _ = tx.send(item);
            }
            state.live = Some(tx);
            state.subscriptions.push(topic);

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as MessageStream)
        })
    }

    fn acknowledge(&self, message: &InboundMessage) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(BrokerError::NotConnected);
        }
        state.acknowledged.push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct AdminState {
    connected: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    fail_connect: bool,
    topics: BTreeSet<String>,
    created: Vec<(String, i32, i32)>,
}

/// In-memory topic administration.
#[derive(Default)]
pub struct InMemoryTopicAdmin {
    state: Mutex<AdminState>,
}

impl InMemoryTopicAdmin {
    /// Admin with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admin that already knows `topics`.
    #[must_use]
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let admin = Self::new();
        admin.lock().topics = topics.into_iter().map(Into::into).collect();
        admin
    }

    fn lock(&self) -> MutexGuard<'_, AdminState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every connect attempt fail.
    pub fn fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Existing topics, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.lock().topics.iter().cloned().collect()
    }

    /// Successful create calls as `(topic, partitions, replication_factor)`.
    #[must_use]
    pub fn created(&self) -> Vec<(String, i32, i32)> {
        self.lock().created.clone()
    }

    /// Number of connect attempts.
    #[must_use]
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Number of disconnect calls.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    /// Whether a management connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

impl TopicAdmin for InMemoryTopicAdmin {
    fn connect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.connect_calls += 1;
            if state.fail_connect {
                return Err(BrokerError::ConnectionFailed("admin connect refused".to_string()));
            }
            state.connected = true;
            Ok(())
        })
    }

    fn disconnect(&self) -> BrokerFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.lock();
            state.disconnect_calls += 1;
            state.connected = false;
            Ok(())
        })
    }

    fn list_topics(&self) -> BrokerFuture<'_, Vec<String>> {
        Box::pin(async move {
            let state = self.lock();
            if !state.connected {
                return Err(BrokerError::NotConnected);
            }
            Ok(state.topics.iter().cloned().collect())
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
            let mut state = self.lock();
            if !state.connected {
                return Err(BrokerError::NotConnected);
            }
            if !state.topics.insert(topic.clone()) {
                return Err(BrokerError::TopicAlreadyExists(topic));
            }
            state.created.push((topic, partitions, replication_factor));
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_buffered_records_are_delivered_on_subscribe() {
        let broker = InMemoryBroker::new();
        broker.push(InboundMessage::new("auth-events", 0, 7));

        broker.connect().await.unwrap();
        let mut stream = broker.subscribe("auth-events").await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().offset, 7);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let broker = InMemoryBroker::new();
        broker.connect().await.unwrap();
        let mut stream = broker.subscribe("auth-events").await.unwrap();

        broker.disconnect().await.unwrap();

        assert!(stream.next().await.is_none());
        assert!(broker.acknowledge(&InboundMessage::default()).is_err());
    }

    #[tokio::test]
    async fn test_scripted_connect_failures() {
        let broker = InMemoryBroker::new();
        broker.fail_connects(2);

        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_ok());
        assert_eq!(broker.connect_calls(), 3);
    }

    #[tokio::test]
    async fn test_admin_rejects_duplicate_create() {
        let admin = InMemoryTopicAdmin::with_topics(["auth-events"]);
        admin.connect().await.unwrap();

        let err = admin.create_topic("auth-events", 3, 1).await.unwrap_err();

        assert_eq!(err, BrokerError::TopicAlreadyExists("auth-events".to_string()));
        assert!(admin.created().is_empty());
    }
}
