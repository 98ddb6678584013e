//! OTP delivery: expiry math, composition, bounded retry.

use crate::backend::{DeliveryBackend, DeliveryReceipt, OutboundEmail};
use crate::error::Result;
use crate::templates::OtpEmail;
use chrono::{DateTime, Datelike, Utc};
use notifier_core::environment::{Clock, SystemClock};
use notifier_core::event::ValidatedOtp;
use notifier_runtime::metrics::DeliveryMetrics;
use notifier_runtime::retry::{RetryPolicy, retry_with_backoff};
use std::sync::Arc;

/// Product-facing strings used in every email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    /// Product name
    pub brand_name: String,
    /// Support contact shown in the HTML body
    pub support_email: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            brand_name: "FleetOS".to_string(),
            support_email: "support@fleetos.com".to_string(),
        }
    }
}

/// Whole minutes from `now` until `expires_at`, rounded up, never below 1.
///
/// ```
/// use chrono::{Duration, Utc};
/// use notifier_mailer::minutes_until;
///
/// let now = Utc::now();
/// assert_eq!(minutes_until(now + Duration::seconds(61), now), 2);
/// assert_eq!(minutes_until(now - Duration::minutes(5), now), 1);
/// ```
#[must_use]
pub fn minutes_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (expires_at - now).num_milliseconds();
    let minutes = remaining_ms / 60_000 + i64::from(remaining_ms % 60_000 > 0);
    minutes.max(1)
}

/// Sends OTP emails through a [`DeliveryBackend`].
pub struct DeliveryService<B, C = SystemClock> {
    backend: Arc<B>,
    clock: C,
    branding: Branding,
    retry: RetryPolicy,
}

impl<B, C> DeliveryService<B, C>
where
    B: DeliveryBackend,
    C: Clock,
{
    /// Create a service with the default backoff (1s base, doubling).
    #[must_use]
    pub fn new(backend: Arc<B>, clock: C, branding: Branding) -> Self {
        Self {
            backend,
            clock,
            branding,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the backoff schedule. The attempt budget still comes from
    /// [`deliver_with_retry`](Self::deliver_with_retry).
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The clock used for countdowns.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Render the email for `otp` as of the current clock reading.
    #[must_use]
    pub fn compose(&self, otp: &ValidatedOtp) -> OutboundEmail {
        let now = self.clock.now();
        let template = OtpEmail {
            brand: &self.branding.brand_name,
            support_email: &self.branding.support_email,
            kind: otp.kind,
            code: &otp.code,
            expires_in_minutes: minutes_until(otp.expires_at, now),
            year: now.year(),
        };

        OutboundEmail {
            to: otp.email.clone(),
            subject: template.subject(),
            html: template.html(),
            text: template.text(),
        }
    }

    /// Render and send once.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub async fn deliver(&self, otp: &ValidatedOtp) -> Result<DeliveryReceipt> {
        let email = self.compose(otp);

        match self.backend.send(&email).await {
            Ok(receipt) => {
                tracing::info!(
                    to = %otp.email,
                    kind = %otp.kind,
                    message_id = %receipt.message_id,
                    "OTP email sent successfully"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(
                    to = %otp.email,
                    kind = %otp.kind,
                    error = %e,
                    "Failed to send OTP email"
                );
                Err(e)
            }
        }
    }

    /// Send with up to `max_attempts` tries, waiting 0s, 1s, 2s, ... between them.
    ///
    /// The email is re-rendered per attempt so the countdown stays accurate.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once every attempt has failed.
    pub async fn deliver_with_retry(
        &self,
        otp: &ValidatedOtp,
        max_attempts: u32,
    ) -> Result<DeliveryReceipt> {
        let policy = self.retry.with_max_attempts(max_attempts);

        match retry_with_backoff(&policy, || self.deliver(otp)).await {
            Ok(receipt) => {
                DeliveryMetrics::record_success();
                Ok(receipt)
            }
            Err(e) => {
                DeliveryMetrics::record_exhausted();
                tracing::error!(
                    to = %otp.email,
                    attempts = policy.max_attempts,
                    error = %e,
                    "Failed to send email after {} attempts",
                    policy.max_attempts
                );
                Err(e)
            }
        }
    }
}
