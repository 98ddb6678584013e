//! Handler for `auth.otp.generated` records.
//!
//! Decodes the envelope, checks the payload-level type, validates the OTP and
//! delivers it with bounded retry. Every failure is absorbed here: the record
//! is logged with its coordinates and the router still advances the offset.

use async_trait::async_trait;
use notifier_core::environment::{Clock, SystemClock};
use notifier_core::event::{DomainEvent, EventError, OtpGeneratedPayload, ValidationError};
use notifier_core::message::InboundMessage;
use notifier_core::OTP_GENERATED_EVENT_TYPE;
use notifier_mailer::{DeliveryBackend, DeliveryError, DeliveryService};
use notifier_runtime::handlers::{HandlerError, MessageHandler};
use notifier_runtime::metrics::{ConsumerMetrics, DiscardReason};
use std::sync::Arc;
use thiserror::Error;

/// Attempts per OTP email before giving up.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// The only `purpose` producers emit today.
const REGISTRATION_PURPOSE: &str = "registration";

/// Why a record did not produce an email.
#[derive(Error, Debug)]
enum OtpHandlingError {
    #[error("Received empty message")]
    Empty,

    #[error(transparent)]
    Decode(#[from] EventError),

    #[error("Unexpected event type: {0}")]
    UnexpectedEventType(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Turns `otp.generated` events into emails.
pub struct OtpEventHandler<B, C = SystemClock> {
    delivery: Arc<DeliveryService<B, C>>,
}

impl<B, C> OtpEventHandler<B, C>
where
    B: DeliveryBackend + 'static,
    C: Clock + 'static,
{
    /// Create a handler that delivers through `delivery`.
    #[must_use]
    pub const fn new(delivery: Arc<DeliveryService<B, C>>) -> Self {
        Self { delivery }
    }

    async fn process(&self, message: &InboundMessage) -> Result<(), OtpHandlingError> {
        let value = message.value().ok_or(OtpHandlingError::Empty)?;
        let event = DomainEvent::<OtpGeneratedPayload>::from_slice(value)?;
        let payload = &event.payload;

        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            email = %payload.email,
            kind = %payload.kind,
            "Processing OTP event"
        );

        if !event.is_type(OTP_GENERATED_EVENT_TYPE) {
            return Err(OtpHandlingError::UnexpectedEventType(event.event_type));
        }

        let otp = payload.validate()?;

        if payload.purpose != REGISTRATION_PURPOSE {
            tracing::debug!(purpose = %payload.purpose, "OTP event with non-registration purpose");
        }

        if otp.is_expired(self.delivery.clock().now()) {
            tracing::warn!(
                email = %otp.email,
                expires_at = %otp.expires_at,
                "OTP already expired, sending anyway"
            );
        }

        self.delivery
            .deliver_with_retry(&otp, MAX_DELIVERY_ATTEMPTS)
            .await?;

        tracing::info!(
            event_id = %event.event_id,
            email = %otp.email,
            "OTP event processed successfully"
        );
        Ok(())
    }
}

#[async_trait]
impl<B, C> MessageHandler for OtpEventHandler<B, C>
where
    B: DeliveryBackend + 'static,
    C: Clock + 'static,
{
    fn name(&self) -> &str {
        "otp-generated"
    }

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let Err(error) = self.process(message).await else {
            return Ok(());
        };

        match &error {
            OtpHandlingError::Empty => {
                ConsumerMetrics::record_discarded(DiscardReason::Empty);
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Received empty message"
                );
            }
            OtpHandlingError::UnexpectedEventType(event_type) => {
                ConsumerMetrics::record_discarded(DiscardReason::WrongEventType);
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    event_type = %event_type,
                    "Unexpected event type"
                );
            }
            OtpHandlingError::Decode(_) | OtpHandlingError::Invalid(_) => {
                let reason = if matches!(error, OtpHandlingError::Decode(_)) {
                    DiscardReason::Malformed
                } else {
                    DiscardReason::Invalid
                };
                ConsumerMetrics::record_discarded(reason);
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %error,
                    "Failed to process OTP event"
                );
            }
            // Exhaustion is already counted and logged by the delivery service
            OtpHandlingError::Delivery(_) => {
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %error,
                    "Failed to process OTP event"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use notifier_mailer::{Branding, MockDeliveryBackend};
    use notifier_runtime::retry::RetryPolicy;
    use notifier_testing::{FixedClock, OtpEventBuilder, otp_message, test_clock};
    use serde_json::json;

    fn handler(
        backend: &Arc<MockDeliveryBackend>,
    ) -> OtpEventHandler<MockDeliveryBackend, FixedClock> {
        let delivery = DeliveryService::new(Arc::clone(backend), test_clock(), Branding::default())
            .with_retry_policy(
                RetryPolicy::builder()
                    .base_delay(std::time::Duration::from_millis(1))
                    .build(),
            );
        OtpEventHandler::new(Arc::new(delivery))
    }

    #[tokio::test]
    async fn test_valid_event_sends_one_email() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(
            0,
            OtpEventBuilder::new().email("a@b.com").otp("123456").to_bytes(),
        );

        handler(&backend).handle(&message).await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert!(sent[0].subject.contains("Registration OTP"));
        assert!(sent[0].html.contains("123456"));
        assert!(sent[0].html.contains("Valid for 10 minutes"));
    }

    #[tokio::test]
    async fn test_wrong_event_type_is_dropped() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(
            0,
            OtpEventBuilder::new().event_type("otp.verified").to_bytes(),
        );

        handler(&backend).handle(&message).await.unwrap();

        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_missing_field_is_dropped() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(0, OtpEventBuilder::new().without("otp").to_bytes());

        handler(&backend).handle(&message).await.unwrap();

        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_dropped() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(0, OtpEventBuilder::new().kind("admin").to_bytes());

        handler(&backend).handle(&message).await.unwrap();

        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_malformed_and_empty_values_are_absorbed() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let handler = handler(&backend);

        handler.handle(&otp_message(0, b"{not json".to_vec())).await.unwrap();
        handler.handle(&otp_message(1, vec![0xff, 0xfe, 0xfd])).await.unwrap();
        handler.handle(&otp_message(2, Vec::new())).await.unwrap();
        handler
            .handle(&InboundMessage::new("auth-events", 0, 3))
            .await
            .unwrap();

        assert_eq!(backend.attempts(), 0);
    }

    #[tokio::test]
    async fn test_expired_otp_is_still_sent() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(
            0,
            OtpEventBuilder::new()
                .expires_at(test_clock().now() - Duration::minutes(5))
                .to_bytes(),
        );

        handler(&backend).handle(&message).await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("Valid for 1 minutes"));
    }

    #[tokio::test]
    async fn test_non_registration_purpose_is_not_enforced() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(
            0,
            OtpEventBuilder::new()
                .field("purpose", json!("password-reset"))
                .to_bytes(),
        );

        handler(&backend).handle(&message).await.unwrap();

        assert_eq!(backend.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_delivery_returns_normally() {
        let backend = Arc::new(MockDeliveryBackend::always_failing());
        let message = otp_message(0, OtpEventBuilder::new().to_bytes());

        handler(&backend).handle(&message).await.unwrap();

        assert_eq!(backend.attempts(), MAX_DELIVERY_ATTEMPTS as usize);
        assert!(backend.sent().is_empty());
    }

    #[tokio::test]
    async fn test_tenant_event_uses_organization_subject() {
        let backend = Arc::new(MockDeliveryBackend::new());
        let message = otp_message(0, OtpEventBuilder::new().kind("tenant").to_bytes());

        handler(&backend).handle(&message).await.unwrap();

        assert!(backend.sent()[0].subject.contains("Organization Registration OTP"));
    }
}
