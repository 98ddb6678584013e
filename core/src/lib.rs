//! # Notifier Core
//!
//! Core types for the notification dispatcher.
//!
//! This crate holds everything the consumption pipeline agrees on and nothing
//! that performs I/O:
//!
//! - [`event`]: the [`DomainEvent`](event::DomainEvent) envelope, the OTP
//!   payload and its validation
//! - [`message`]: owned inbound broker records
//! - [`broker`]: the consumer and topic-admin traits implemented by the
//!   Kafka adapter and the in-memory fakes
//! - [`environment`]: injected capabilities such as the [`Clock`](environment::Clock)
//!
//! ## Pipeline
//!
//! ```text
//! broker record ──► InboundMessage ──► header routing ──► DomainEvent<OtpGeneratedPayload>
//!                                                              │
//!                                                              ▼
//!                                                        ValidatedOtp ──► delivery
//! ```

pub mod broker;
pub mod event;
pub mod message;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - injected capabilities.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use broker::{BrokerConsumer, BrokerError, ConsumerState, MessageStream, TopicAdmin};
pub use environment::{Clock, SystemClock};
pub use event::{DomainEvent, OtpGeneratedPayload, OtpKind, ValidatedOtp, ValidationError};
pub use message::InboundMessage;

/// Topic carrying authentication domain events.
pub const AUTH_EVENTS_TOPIC: &str = "auth-events";

/// Transport header holding the routing tag.
pub const EVENT_TYPE_HEADER: &str = "event-type";

/// Routing tag set by the producer on OTP issuance records.
pub const OTP_GENERATED_TAG: &str = "auth.otp.generated";

/// Envelope `eventType` expected by the OTP handler.
pub const OTP_GENERATED_EVENT_TYPE: &str = "otp.generated";
