//! Integration tests for [`KafkaConsumer`] and [`KafkaTopicAdmin`] with a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Topic creation, listing and the already-exists mapping
//! - Header extraction on consumed records
//! - Manual offset commits
//! - Stream termination on disconnect
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` because they need Docker and take 15-60 seconds to
//! start Kafka. To run explicitly:
//! ```bash
//! cargo test -p notifier-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use futures::StreamExt;
use notifier_core::broker::{BrokerConsumer, BrokerError, TopicAdmin};
use notifier_redpanda::{KafkaConsumer, KafkaSettings, KafkaTopicAdmin};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

fn settings(brokers: &str, group: &str) -> KafkaSettings {
    KafkaSettings::builder()
        .brokers(brokers)
        .group_id(group)
        .auto_offset_reset("earliest")
        .session_timeout(Duration::from_secs(10))
        .build()
        .expect("valid settings")
}

/// Retry topic creation until the freshly started broker accepts admin requests.
async fn create_topic_when_ready(admin: &KafkaTopicAdmin, topic: &str) {
    for attempt in 1..=60 {
        match admin.create_topic(topic, 3, 1).await {
            Ok(()) | Err(BrokerError::TopicAlreadyExists(_)) => return,
            Err(_) => tokio::time::sleep(Duration::from_millis(500)).await,
        }
        assert!(attempt != 60, "Kafka failed to accept topic creation");
    }
}

async fn produce(brokers: &str, topic: &str, tag: &str, payload: &str) {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "10000")
        .create()
        .expect("Failed to create producer");

    let headers = OwnedHeaders::new().insert(Header {
        key: "event-type",
        value: Some(tag),
    });
    producer
        .send(
            FutureRecord::to(topic)
                .key("user@example.com")
                .payload(payload)
                .headers(headers),
            Duration::from_secs(10),
        )
        .await
        .map_err(|(e, _)| e)
        .expect("Failed to produce record");
}

#[tokio::test]
#[ignore]
async fn test_topic_provisioning_round_trip() {
    let (_kafka, brokers) = start_kafka().await;
    let admin = KafkaTopicAdmin::new(settings(&brokers, "admin-test"));

    admin.connect().await.expect("admin connect");
    create_topic_when_ready(&admin, "auth-events").await;

    let topics = admin.list_topics().await.expect("list topics");
    assert!(topics.iter().any(|t| t == "auth-events"));

    let err = admin
        .create_topic("auth-events", 3, 1)
        .await
        .expect_err("second create must fail");
    assert_eq!(err, BrokerError::TopicAlreadyExists("auth-events".to_string()));

    admin.disconnect().await.expect("admin disconnect");
}

#[tokio::test]
#[ignore]
async fn test_consume_with_headers_and_commit() {
    let (_kafka, brokers) = start_kafka().await;
    let admin = KafkaTopicAdmin::new(settings(&brokers, "admin-test"));
    admin.connect().await.expect("admin connect");
    create_topic_when_ready(&admin, "auth-events").await;
    admin.disconnect().await.expect("admin disconnect");

    let consumer = KafkaConsumer::new(settings(&brokers, "notification-it"));
    consumer.connect().await.expect("consumer connect");
    let mut stream = consumer.subscribe("auth-events").await.expect("subscribe");

    produce(&brokers, "auth-events", "auth.otp.generated", r#"{"eventType":"otp.generated"}"#).await;

    let message = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .expect("Timeout waiting for record")
        .expect("stream ended")
        .expect("stream error");

    assert_eq!(message.topic, "auth-events");
    assert_eq!(message.header("event-type"), Some("auth.otp.generated"));
    assert_eq!(message.key_lossy().as_deref(), Some("user@example.com"));
    assert!(message.value().is_some());
    consumer.acknowledge(&message).expect("commit queued");

    consumer.disconnect().await.expect("disconnect");
    let next = tokio::time::timeout(Duration::from_secs(10), stream.next())
        .await
        .expect("stream should end after disconnect");
    assert!(next.is_none());
}

#[tokio::test]
#[ignore]
async fn test_connect_fails_against_unreachable_broker() {
    let consumer = KafkaConsumer::new(
        KafkaSettings::builder()
            .brokers("127.0.0.1:1")
            .connection_timeout(Duration::from_secs(2))
            .build()
            .expect("valid settings"),
    );

    let err = consumer.connect().await.expect_err("connect must fail");
    assert!(matches!(err, BrokerError::ConnectionFailed(_)));
}
