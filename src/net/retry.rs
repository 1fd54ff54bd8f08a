//! Bounded exponential-backoff retry for single outbound requests.
//!
//! The retry state machine is an explicit loop: attempt counter and delay
//! are plain locals, visible and testable, never threaded through
//! exception control flow.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::api::ApiError;
use crate::net::NetworkMonitor;

/// Retry configuration for one logical request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  /// Retries after the initial attempt
  pub max_retries: u32,
  /// Backoff before the first retry
  pub initial_delay: Duration,
  /// Backoff ceiling
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_delay: Duration::from_secs(1),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// Backoff before retry number `retry` (zero-based): doubles each
  /// retry, capped at `max_delay`.
  pub fn delay_for(&self, retry: u32) -> Duration {
    let doubled = self
      .initial_delay
      .checked_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
      .unwrap_or(self.max_delay);
    doubled.min(self.max_delay)
  }
}

/// Run `op` with retry.
///
/// Stops immediately on non-retryable outcomes (401/403/404) and when the
/// network monitor reports offline, without consuming further attempts.
/// Returns the last observed error once the budget is exhausted.
pub async fn with_retry<T, F, Fut>(
  policy: &RetryPolicy,
  monitor: &NetworkMonitor,
  op: F,
) -> Result<T, ApiError>
where
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T, ApiError>>,
{
  let mut attempt: u32 = 0;

  loop {
    if !monitor.status().is_online {
      return Err(ApiError::Offline);
    }

    match op().await {
      Ok(value) => return Ok(value),
      Err(err) if !err.is_retryable() => return Err(err),
      Err(err) => {
        if attempt >= policy.max_retries {
          return Err(err);
        }
        let delay = policy.delay_for(attempt);
        debug!(attempt, ?delay, "request failed, backing off: {err}");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
    }
  }
}
