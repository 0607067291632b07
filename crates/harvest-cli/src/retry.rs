//! Retry with exponential back-off and jitter for traversal steps.
//!
//! [`retry_with_backoff`] wraps one fetch-and-extract step and retries it
//! when the failure classifier marks the error retryable. `Unsupported`
//! errors are returned immediately; retrying cannot change which page kind a
//! URL maps to.

use std::borrow::Borrow;
use std::future::Future;
use std::time::Duration;

use harvest_scraper::{Failure, HarvestError};

/// Upper bound on a single back-off sleep.
const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. `0` disables retries.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Sleep before retry number `attempt` (1-based), before jitter.
    #[must_use]
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(10);
        self.backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(MAX_DELAY_MS)
    }
}

/// Returns `true` for errors worth another attempt.
#[must_use]
pub fn is_retriable(err: &HarvestError) -> bool {
    Failure::classify(err).retryable
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// retryable errors.
///
/// The error type only has to expose the [`HarvestError`] it wraps, so steps
/// can carry partial output alongside the failure.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Retry | Sleep before it                  |
/// |-------|----------------------------------|
/// | 1     | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2     | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3     | 1 000 ms × 2² ± 25 % jitter     |
///
/// Delay is capped at 60 s.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once retries are
/// exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Borrow<HarvestError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let harvest_err: &HarvestError = err.borrow();
                if !is_retriable(harvest_err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = policy.delay_ms(attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    kind = %harvest_err.kind(),
                    error = %harvest_err,
                    "transient harvest error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
