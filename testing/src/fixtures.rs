//! Builders for inbound OTP records.

use chrono::{DateTime, Duration, Utc};
use notifier_core::environment::Clock;
use notifier_core::message::InboundMessage;
use notifier_core::{AUTH_EVENTS_TOPIC, EVENT_TYPE_HEADER, OTP_GENERATED_EVENT_TYPE, OTP_GENERATED_TAG};
use serde_json::{Map, Value, json};

/// Builds the JSON body of an `otp.generated` envelope.
///
/// Defaults to a user OTP for `user@example.com` expiring ten minutes after
/// [`test_clock`](crate::test_clock).
#[derive(Debug, Clone)]
pub struct OtpEventBuilder {
    event_type: String,
    payload: Map<String, Value>,
}

impl Default for OtpEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpEventBuilder {
    /// Envelope with a complete, valid payload.
    #[must_use]
    pub fn new() -> Self {
        let expires_at = crate::test_clock().now() + Duration::minutes(10);
        let mut payload = Map::new();
        payload.insert("email".into(), json!("user@example.com"));
        payload.insert("otp".into(), json!("123456"));
        payload.insert("type".into(), json!("user"));
        payload.insert("expiresAt".into(), json!(expires_at.to_rfc3339()));
        payload.insert("purpose".into(), json!("registration"));
        Self {
            event_type: OTP_GENERATED_EVENT_TYPE.to_string(),
            payload,
        }
    }

    /// Override the envelope `eventType`.
    #[must_use]
    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event_type = event_type.to_string();
        self
    }

    /// Set the recipient.
    #[must_use]
    pub fn email(self, email: &str) -> Self {
        self.field("email", json!(email))
    }

    /// Set the code.
    #[must_use]
    pub fn otp(self, otp: &str) -> Self {
        self.field("otp", json!(otp))
    }

    /// Set the `type` discriminator.
    #[must_use]
    pub fn kind(self, kind: &str) -> Self {
        self.field("type", json!(kind))
    }

    /// Set the expiry instant.
    #[must_use]
    pub fn expires_at(self, expires_at: DateTime<Utc>) -> Self {
        self.field("expiresAt", json!(expires_at.to_rfc3339()))
    }

    /// Set any payload field to a raw JSON value.
    #[must_use]
    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.payload.insert(name.to_string(), value);
        self
    }

    /// Remove a payload field.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.payload.remove(name);
        self
    }

    /// The envelope as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "eventId": "6f1c9a52-8d2e-4c6b-9b7a-2f4e1d3c5a70",
            "eventType": self.event_type,
            "timestamp": crate::test_clock().now().to_rfc3339(),
            "version": "1.0",
            "payload": Value::Object(self.payload.clone()),
        })
    }

    /// The envelope serialized as record bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}

/// A record on `auth-events` tagged `auth.otp.generated`.
#[must_use]
pub fn otp_message(offset: i64, payload: impl Into<Vec<u8>>) -> InboundMessage {
    InboundMessage::new(AUTH_EVENTS_TOPIC, 0, offset)
        .with_key(b"user@example.com".to_vec())
        .with_header(EVENT_TYPE_HEADER, OTP_GENERATED_TAG)
        .with_payload(payload.into())
}
