//! Mock delivery backend for testing.

use crate::backend::{DeliveryBackend, DeliveryReceipt, OutboundEmail};
use crate::error::{DeliveryError, Result};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Never,
    First(usize),
    Always,
}

#[derive(Debug)]
struct MockState {
    mode: FailureMode,
    verify_fails: bool,
    sent: Vec<OutboundEmail>,
    attempts: Vec<Instant>,
}

/// Mock delivery backend.
///
/// Records every attempt and every accepted email without touching the
/// network. Attempt timestamps use [`tokio::time::Instant`], so paused-time
/// tests can assert the backoff schedule exactly.
#[derive(Debug)]
pub struct MockDeliveryBackend {
    state: Mutex<MockState>,
}

impl Default for MockDeliveryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeliveryBackend {
    /// Backend that accepts every email.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(FailureMode::Never)
    }

    /// Backend that rejects the first `failures` attempts.
    #[must_use]
    pub fn failing_first(failures: usize) -> Self {
        Self::with_mode(FailureMode::First(failures))
    }

    /// Backend that rejects every attempt.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::with_mode(FailureMode::Always)
    }

    fn with_mode(mode: FailureMode) -> Self {
        Self {
            state: Mutex::new(MockState {
                mode,
                verify_fails: false,
                sent: Vec::new(),
                attempts: Vec::new(),
            }),
        }
    }

    /// Make [`verify`](DeliveryBackend::verify) fail.
    #[must_use]
    pub fn with_failing_verify(self) -> Self {
        self.lock().verify_fails = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emails accepted so far.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.lock().sent.clone()
    }

    /// Number of send attempts, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.lock().attempts.len()
    }

    /// When each send attempt started.
    #[must_use]
    pub fn attempt_instants(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }
}

impl DeliveryBackend for MockDeliveryBackend {
    fn send(&self, email: &OutboundEmail) -> impl Future<Output = Result<DeliveryReceipt>> + Send {
        let result = {
            let mut state = self.lock();
            state.attempts.push(Instant::now());
            let attempt = state.attempts.len();

            let fail = match state.mode {
                FailureMode::Never => false,
                FailureMode::First(n) => attempt <= n,
                FailureMode::Always => true,
            };

            if fail {
                Err(DeliveryError::Send(format!("mock failure on attempt {attempt}")))
            } else {
                state.sent.push(email.clone());
                Ok(DeliveryReceipt {
                    message_id: format!("250 OK mock-{}", state.sent.len()),
                })
            }
        };

        async move { result }
    }

    fn verify(&self) -> impl Future<Output = Result<()>> + Send {
        let verify_fails = self.lock().verify_fails;
        async move {
            if verify_fails {
                Err(DeliveryError::Transport("mock relay unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }
}
