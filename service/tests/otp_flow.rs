//! End-to-end tests: router → OTP handler → delivery service → mock backend.
//!
//! Records go through the in-memory broker, so every test also checks which
//! offsets were acknowledged.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use axum::extract::State;
use axum::http::StatusCode;
use notification_service::app::NotificationApp;
use notification_service::server::health::readiness_check;
use notification_service::server::AppState;
use notification_service::OtpEventHandler;
use notifier_core::message::InboundMessage;
use notifier_core::{AUTH_EVENTS_TOPIC, EVENT_TYPE_HEADER, OTP_GENERATED_TAG};
use notifier_mailer::{Branding, DeliveryService, MockDeliveryBackend};
use notifier_runtime::{HandlerRegistry, MetricsRecorder};
use notifier_testing::{InMemoryBroker, InMemoryTopicAdmin, OtpEventBuilder, otp_message, test_clock};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    broker: Arc<InMemoryBroker>,
    admin: Arc<InMemoryTopicAdmin>,
    backend: Arc<MockDeliveryBackend>,
    app: Arc<NotificationApp>,
}

impl Harness {
    fn new(backend: MockDeliveryBackend) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let admin = Arc::new(InMemoryTopicAdmin::new());
        let backend = Arc::new(backend);

        let delivery = Arc::new(DeliveryService::new(
            Arc::clone(&backend),
            test_clock(),
            Branding::default(),
        ));
        let registry = HandlerRegistry::new()
            .register(OTP_GENERATED_TAG, Arc::new(OtpEventHandler::new(delivery)));

        let app = Arc::new(NotificationApp::new(
            AUTH_EVENTS_TOPIC,
            Arc::clone(&broker) as _,
            Arc::clone(&admin) as _,
            registry,
        ));

        Self {
            broker,
            admin,
            backend,
            app,
        }
    }

    async fn start(&self) {
        self.app.connect_and_start().await.unwrap();
    }

    /// Wait until `count` records have been acknowledged.
    async fn acknowledged(&self, count: usize) -> Vec<i64> {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                let acked = self.broker.acknowledged();
                if acked.len() >= count {
                    return acked.iter().map(|m| m.offset).collect();
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} acknowledgements"))
    }
}

#[tokio::test]
async fn test_valid_event_sends_one_email_and_commits() {
    let harness = Harness::new(MockDeliveryBackend::new());
    harness.broker.push(otp_message(
        0,
        OtpEventBuilder::new().email("a@b.com").otp("123456").to_bytes(),
    ));

    harness.start().await;

    assert_eq!(harness.acknowledged(1).await, vec![0]);
    let sent = harness.backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@b.com");
    assert!(sent[0].subject.contains("Registration OTP"));
    assert!(sent[0].html.contains("123456"));
    assert!(sent[0].text.contains("123456"));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_delivery_still_advances_offset() {
    let harness = Harness::new(MockDeliveryBackend::always_failing());
    harness.broker.push(otp_message(0, OtpEventBuilder::new().to_bytes()));
    harness.broker.push(otp_message(1, b"{not json".to_vec()));

    harness.start().await;

    assert_eq!(harness.acknowledged(2).await, vec![0, 1]);
    assert_eq!(harness.backend.attempts(), 3);
    assert!(harness.backend.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule_between_attempts() {
    let harness = Harness::new(MockDeliveryBackend::failing_first(2));
    harness.broker.push(otp_message(0, OtpEventBuilder::new().to_bytes()));

    harness.start().await;
    harness.acknowledged(1).await;

    let instants = harness.backend.attempt_instants();
    assert_eq!(instants.len(), 3);
    assert_eq!(instants[1] - instants[0], Duration::from_millis(1000));
    assert_eq!(instants[2] - instants[1], Duration::from_millis(2000));
    assert_eq!(harness.backend.sent().len(), 1);
}

#[tokio::test]
async fn test_malformed_records_are_discarded() {
    let harness = Harness::new(MockDeliveryBackend::new());
    harness.broker.push(otp_message(0, b"{not json".to_vec()));
    harness.broker.push(otp_message(1, vec![0xc3, 0x28]));
    harness.broker.push(otp_message(2, Vec::new()));
    harness
        .broker
        .push(otp_message(3, OtpEventBuilder::new().without("email").to_bytes()));
    harness
        .broker
        .push(otp_message(4, OtpEventBuilder::new().kind("admin").to_bytes()));
    harness.broker.push(otp_message(
        5,
        OtpEventBuilder::new().event_type("otp.verified").to_bytes(),
    ));

    harness.start().await;

    assert_eq!(harness.acknowledged(6).await, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(harness.backend.attempts(), 0);
}

#[tokio::test]
async fn test_unrouted_records_are_ignored_but_committed() {
    let harness = Harness::new(MockDeliveryBackend::new());
    let payload = OtpEventBuilder::new().to_bytes();

    harness.broker.push(
        InboundMessage::new(AUTH_EVENTS_TOPIC, 1, 0)
            .with_header(EVENT_TYPE_HEADER, "auth.user.registered")
            .with_payload(payload.clone()),
    );
    harness
        .broker
        .push(InboundMessage::new(AUTH_EVENTS_TOPIC, 1, 1).with_payload(payload));

    harness.start().await;

    assert_eq!(harness.acknowledged(2).await, vec![0, 1]);
    assert_eq!(harness.backend.attempts(), 0);
}

#[tokio::test]
async fn test_records_are_handled_in_order() {
    let harness = Harness::new(MockDeliveryBackend::new());
    for (offset, email) in ["first@example.com", "second@example.com", "third@example.com"]
        .iter()
        .enumerate()
    {
        harness.broker.push(otp_message(
            i64::try_from(offset).unwrap(),
            OtpEventBuilder::new().email(email).to_bytes(),
        ));
    }

    harness.start().await;

    assert_eq!(harness.acknowledged(3).await, vec![0, 1, 2]);
    let recipients: Vec<String> = harness.backend.sent().into_iter().map(|e| e.to).collect();
    assert_eq!(
        recipients,
        vec!["first@example.com", "second@example.com", "third@example.com"]
    );
}

#[tokio::test]
async fn test_start_provisions_topic_and_reports_ready() {
    let harness = Harness::new(MockDeliveryBackend::new());
    let state = AppState::new(
        Arc::clone(harness.app.connection()),
        Arc::new(MetricsRecorder::new()),
    );

    let (status, _) = readiness_check(State(state.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    harness.start().await;

    assert_eq!(harness.admin.created(), vec![(AUTH_EVENTS_TOPIC.to_string(), 3, 1)]);
    assert_eq!(harness.broker.subscriptions(), vec![AUTH_EVENTS_TOPIC.to_string()]);
    let (status, axum::Json(body)) = readiness_check(State(state.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, "ready");
    assert_eq!(body.consumer, "running");

    harness.app.shutdown().await;
    let (status, _) = readiness_check(State(state)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_second_start_is_a_no_op() {
    let harness = Harness::new(MockDeliveryBackend::new());

    harness.start().await;
    harness.start().await;

    assert_eq!(harness.broker.connect_calls(), 1);
    assert_eq!(harness.broker.subscriptions().len(), 1);
    assert_eq!(harness.admin.created().len(), 1);
}
