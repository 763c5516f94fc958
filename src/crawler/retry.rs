//! Bounded retry with exponential backoff and jitter
//!
//! One policy object is shared by every call site that retries: page fetches
//! in the fetcher and session setup in the coordinator.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Retry bounds and backoff shape
///
/// The delay after the n-th failed attempt is `base * 2^n + uniform(0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff unit multiplied by `2^attempt`
    pub base: Duration,

    /// Upper bound of the random delay added to every backoff
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Result of a retried operation together with the attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            jitter,
        }
    }

    /// A policy that retries without waiting
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after the `attempt`-th failure (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self.base.saturating_mul(2u32.saturating_pow(attempt));

        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };

        exponential + jitter
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. Transient failures are
    /// followed by a backoff sleep; the last error is returned once the bound
    /// is reached.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!(
                            "{} failed after {} attempts: {}",
                            label,
                            attempt,
                            e
                        );
                    } else {
                        tracing::error!("{} failed permanently: {}", label, e);
                    }
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
