//! # Notifier Testing
//!
//! Testing utilities for the notification dispatcher.
//!
//! This crate provides:
//! - [`FixedClock`] and [`test_clock`] for deterministic expiry math
//! - [`InMemoryBroker`] and [`InMemoryTopicAdmin`], scriptable stand-ins for Kafka
//! - [`OtpEventBuilder`] and [`otp_message`] for building inbound records
//!
//! ## Example
//!
//! ```ignore
//! use notifier_testing::{InMemoryBroker, OtpEventBuilder, otp_message};
//!
//! #[tokio::test]
//! async fn test_delivers_otp() {
//!     let broker = Arc::new(InMemoryBroker::new());
//!     // ... wire the router with `broker` ...
//!     broker.push(otp_message(0, OtpEventBuilder::new().to_bytes()));
//!     assert_eq!(broker.acknowledged().len(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use notifier_core::environment::Clock;

pub mod broker;
pub mod fixtures;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use notifier_testing::mocks::FixedClock;
    /// use notifier_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use broker::{InMemoryBroker, InMemoryTopicAdmin};
pub use fixtures::{OtpEventBuilder, otp_message};
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
