//! Bounded retry with exponential backoff.
//!
//! Used by the delivery service to ride out transient SMTP failures.
//!
//! # Schedule
//!
//! Attempt 1 runs immediately. Attempt *n* (n ≥ 2) waits
//! `base_delay * 2^(n-2)` first, so with the default one-second base:
//!
//! ```text
//! attempt 1 ── 0s ──► attempt 2 ── 1s ──► attempt 3 ── 2s ──► (exhausted)
//! ```
//!
//! At most `max_attempts` calls are made in total. On exhaustion the error of
//! the last attempt is returned.
//!
//! # Example
//!
//! ```rust
//! use notifier_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(100))
//!     .build();
//!
//! let result = retry_with_backoff(&policy, || async {
//!     Ok::<_, String>(42)
//! }).await?;
//!
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of total attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1000ms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            base_delay: None,
        }
    }

    /// Same policy with a different attempt budget (at least one).
    #[must_use]
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Delay to wait before the given 1-indexed attempt.
    ///
    /// Zero for the first attempt, `base_delay * 2^(attempt-2)` afterwards.
    /// Saturates instead of overflowing.
    #[must_use]
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let factor = 2_u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts. Values below one are raised to one.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay before the second attempt.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
            base_delay: self.base_delay.unwrap_or(DEFAULT_BASE_DELAY),
        }
    }
}

/// Retry an async operation with exponential backoff.
///
/// # Arguments
///
/// * `policy` - Retry policy configuration
/// * `operation` - Async operation to retry (must be `FnMut` to allow multiple calls)
///
/// # Returns
///
/// Returns `Ok(T)` as soon as one attempt succeeds, or `Err(E)` with the
/// error of the final attempt once `max_attempts` calls have failed.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        RetryMetrics::record_attempt();

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, max_attempts, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "Operation failed after max attempts"
                    );
                    RetryMetrics::record_exhausted();
                    return Err(err);
                }

                let delay = policy.delay_before_attempt(attempt + 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Attempt {attempt}/{max_attempts} failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
