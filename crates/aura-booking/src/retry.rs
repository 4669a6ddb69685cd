//! # Retry Policy
//!
//! Exponential backoff for calls to read-only collaborators (catalog,
//! customer history, acceptance predictor).
//!
//! ```text
//! attempt 1 ──fail──► sleep ~200ms ──► attempt 2 ──fail──► sleep ~400ms ──► attempt 3
//!                                                                              │
//!                                             non-retryable error or last ◄────┘
//!                                             attempt: returned to caller
//! ```
//!
//! Gateway and ledger writes are never retried here: they carry their own
//! idempotency and a blind retry could open a second order.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::error::BookingResult;

/// How often and how patiently a collaborator call is repeated.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_interval: Duration, max_interval: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_interval,
            max_interval: max_interval.max(initial_interval),
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        RetryPolicy::new(
            settings.max_attempts,
            settings.initial_backoff(),
            settings.max_backoff(),
        )
    }

    /// A single attempt.
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        // Default::default() seeds current_interval with the crate default.
        backoff.reset();
        backoff
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable
    /// error, or the attempts are used up.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> BookingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BookingResult<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.max_interval);
                    warn!(
                        operation = name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
