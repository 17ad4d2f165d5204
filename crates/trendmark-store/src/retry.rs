//! Deadline-bounded retry with exponential backoff

use crate::AdapterError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;
use trendmark_domain::traits::CollaboratorError;

/// Retry policy for collaborator calls
///
/// Only [`CollaboratorError::Unavailable`] is retried. No retry is started once the
/// next attempt could not begin before the caller's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts, first try included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts or
    /// the deadline passes
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        deadline: Instant,
        mut op: F,
    ) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match timeout_at(deadline, op()).await {
                Err(_) => return Err(AdapterError::Timeout(what.to_string())),
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
            };

            if !error.is_transient() || attempt >= self.max_attempts {
                return Err(AdapterError::from_collaborator(error, attempt));
            }

            let wake = Instant::now() + self.delay_after(attempt);
            if wake >= deadline {
                return Err(AdapterError::from_collaborator(error, attempt));
            }
            debug!("{} failed (attempt {}), retrying: {}", what, attempt, error);
            sleep_until(wake).await;
        }
    }
}
