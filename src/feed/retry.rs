//! Bounded retries with full-jitter exponential backoff.
//!
//! The delay before retry `n` (1-based) is drawn uniformly from
//! `[0, min(cap, base * 2^n)]`, so that many clients failing together do not
//! come back in lock-step.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::FetchError;

/// Default total attempts, including the first.
pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(400);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Client errors that are never retried.
pub const NO_RETRY_STATUSES: [u16; 5] = [400, 401, 403, 404, 422];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Independent deadline for every single attempt
    pub attempt_timeout: Duration,
    pub no_retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            no_retry_statuses: NO_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the jitter window after the given 1-based attempt.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Full-jitter delay for the given 1-based attempt.
    pub fn backoff<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling_ms = self.backoff_ceiling(attempt).as_millis() as u64;
        Duration::from_millis(rng.gen_range(0..=ceiling_ms))
    }
}

/// Run `op` until it succeeds, fails with a non-retriable error, or the
/// attempt budget is spent. `op` receives the 1-based attempt number.
///
/// The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(policy.attempt_timeout)),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retriable(policy) {
            debug!("Attempt {} failed with non-retriable error: {}", attempt, err);
            return Err(err);
        }
        if attempt >= attempts {
            warn!("Giving up after {} attempt(s): {}", attempt, err);
            return Err(err);
        }

        // ThreadRng is not Send; keep it out of the await below.
        let delay = policy.backoff(attempt, &mut rand::thread_rng());
        warn!(
            "Attempt {}/{} failed: {} (retrying in {:?})",
            attempt, attempts, err, delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
