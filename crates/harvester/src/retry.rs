//! Bounded retries with exponential backoff.
//!
//! Only errors for which [`HarvestError::is_transient`] holds are retried. The first delay is
//! `initial_delay`, each following one is multiplied by `backoff_multiplier` and capped at
//! `max_delay`.

use std::future::Future;

use super::*;

/// How often and how patiently to retry a failing request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first one; `0` behaves like `1`
  pub max_attempts:       u32,
  /// Delay before the second attempt
  pub initial_delay:      Duration,
  /// Upper bound for any single delay
  pub max_delay:          Duration,
  /// Growth factor between consecutive delays
  pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:       3,
      initial_delay:      Duration::from_secs(1),
      max_delay:          Duration::from_secs(30),
      backoff_multiplier: 2.0,
    }
  }
}

impl RetryPolicy {
  /// A policy that retries `max_attempts - 1` times without sleeping in between.
  pub fn immediate(max_attempts: u32) -> Self {
    Self {
      max_attempts,
      initial_delay: Duration::ZERO,
      max_delay: Duration::ZERO,
      backoff_multiplier: 1.0,
    }
  }

  /// Delay to wait after the given (1-based) failed attempt.
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
    Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay).min(self.max_delay)
  }
}

/// The last error of an operation that ran out of attempts, or failed permanently.
#[derive(Debug)]
pub struct RetryFailure {
  /// Attempts made, including the first
  pub attempts: u32,
  /// Error returned by the final attempt
  pub error:    HarvestError,
}

/// Runs `operation` until it succeeds, fails permanently, or exhausts `policy`.
pub async fn with_retry<T, F, Fut>(
  policy: &RetryPolicy,
  mut operation: F,
) -> core::result::Result<T, RetryFailure>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut attempt = 0;
  loop {
    attempt += 1;
    match operation().await {
      Ok(value) => {
        if attempt > 1 {
          info!("Operation succeeded on attempt {attempt}");
        }
        return Ok(value);
      },
      Err(error) if error.is_transient() && attempt < policy.max_attempts => {
        let delay = policy.delay_after(attempt);
        warn!(
          attempt,
          max_attempts = policy.max_attempts,
          delay_ms = delay.as_millis() as u64,
          "Transient failure, retrying: {error}"
        );
        tokio::time::sleep(delay).await;
      },
      Err(error) => return Err(RetryFailure { attempts: attempt, error }),
    }
  }
}
