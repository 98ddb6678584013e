//! Domain event envelope and the OTP issuance payload.
//!
//! Events arrive as UTF-8 JSON produced by the authentication service:
//!
//! ```json
//! {
//!   "eventId": "8c1f...",
//!   "eventType": "otp.generated",
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "version": "1.0",
//!   "payload": {
//!     "email": "a@b.com",
//!     "otp": "123456",
//!     "type": "user",
//!     "expiresAt": "2025-01-01T00:05:00Z",
//!     "purpose": "registration"
//!   }
//! }
//! ```
//!
//! Decoding and validation are separate steps. A record that is not JSON is an
//! [`EventError`]; a record that is JSON but carries an empty or unknown field
//! is a [`ValidationError`]. Both are dropped by the handler, but they are
//! logged differently.
//!
//! # Example
//!
//! ```
//! use notifier_core::event::{DomainEvent, OtpGeneratedPayload};
//! use chrono::{TimeZone, Utc};
//!
//! let raw = br#"{"eventId":"e1","eventType":"otp.generated","timestamp":"t","version":"1",
//!     "payload":{"email":"a@b.com","otp":"123456","type":"user",
//!     "expiresAt":"2025-01-01T00:05:00Z","purpose":"registration"}}"#;
//!
//! let event = DomainEvent::<OtpGeneratedPayload>::from_slice(raw).unwrap();
//! let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! let otp = event.payload.validate().unwrap();
//! assert!(!otp.is_expired(now));
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error types for event decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Record value was not valid UTF-8.
    #[error("Event is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Record value was not a JSON document matching the envelope.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(#[from] serde_json::Error),
}

/// Reasons an OTP payload is rejected before delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("Invalid payload: missing required field '{0}'")]
    MissingField(&'static str),

    /// `type` was neither `user` nor `tenant`.
    #[error("Invalid type: {0}")]
    UnknownKind(String),

    /// `expiresAt` could not be parsed as an RFC 3339 timestamp.
    #[error("Invalid expiresAt '{value}': {reason}")]
    InvalidExpiry {
        /// The raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Envelope wrapping any event payload.
///
/// Field names follow the producer's camelCase JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent<T> {
    /// Opaque unique identifier
    pub event_id: String,
    /// Payload-level type tag, e.g. `"otp.generated"`
    pub event_type: String,
    /// ISO-8601 emission time (kept verbatim)
    pub timestamp: String,
    /// Schema version
    pub version: String,
    /// Typed body
    pub payload: T,
}

impl<T: DeserializeOwned> DomainEvent<T> {
    /// Decode an envelope from a raw record value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidUtf8`] if the bytes are not UTF-8 and
    /// [`EventError::DeserializationError`] if they are not a matching JSON document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EventError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }
}

impl<T> DomainEvent<T> {
    /// Whether the envelope carries the expected payload-level type.
    #[must_use]
    pub fn is_type(&self, expected: &str) -> bool {
        self.event_type == expected
    }
}

/// Registration flavour of an OTP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    /// End-user registration
    User,
    /// Organization (tenant) registration
    Tenant,
}

impl OtpKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Tenant => "tenant",
        }
    }
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "tenant" => Ok(Self::Tenant),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// Body of an `otp.generated` event as it appears on the wire.
///
/// Every field defaults to empty so a record with a missing field still
/// decodes and is rejected by [`validate`](Self::validate) instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OtpGeneratedPayload {
    /// Destination address
    pub email: String,
    /// The code to deliver
    pub otp: String,
    /// `user` or `tenant`
    #[serde(rename = "type")]
    pub kind: String,
    /// ISO-8601 expiry
    pub expires_at: String,
    /// Always `"registration"` today
    pub purpose: String,
}

impl OtpGeneratedPayload {
    /// Check structural and semantic validity.
    ///
    /// Fields are checked in the order `email`, `otp`, `type`, `expiresAt`.
    /// An expiry in the past is valid; see [`ValidatedOtp::is_expired`].
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MissingField`] for an empty required field
    /// - [`ValidationError::UnknownKind`] if `type` is not `user`/`tenant`
    /// - [`ValidationError::InvalidExpiry`] if `expiresAt` does not parse
    pub fn validate(&self) -> Result<ValidatedOtp, ValidationError> {
        let required = [
            ("email", &self.email),
            ("otp", &self.otp),
            ("type", &self.kind),
            ("expiresAt", &self.expires_at),
        ];
        if let Some(&(name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::MissingField(name));
        }

        let kind = self.kind.parse::<OtpKind>()?;
        let expires_at = DateTime::parse_from_rfc3339(&self.expires_at)
            .map_err(|e| ValidationError::InvalidExpiry {
                value: self.expires_at.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        Ok(ValidatedOtp {
            email: self.email.clone(),
            code: self.otp.clone(),
            kind,
            expires_at,
        })
    }
}

/// An OTP payload that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedOtp {
    /// Destination address
    pub email: String,
    /// The code to deliver
    pub code: String,
    /// Registration flavour
    pub kind: OtpKind,
    /// Expiry instant
    pub expires_at: DateTime<Utc>,
}

impl ValidatedOtp {
    /// Whether the code had already expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
