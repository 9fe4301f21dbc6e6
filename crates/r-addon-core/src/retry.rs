//! ---
//! addon_section: "01-core-functionality"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Add-on convergence engine and its building blocks."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use r_addon_common::RetryConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Exponential backoff parameters for retryable remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Ceiling applied to every delay before jitter.
    pub max_delay: Duration,
    /// Maximum random delay added on top of each step.
    pub jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay, config.max_delay, config.jitter)
    }

    /// Delay after the given attempt (1-indexed), doubling up to the ceiling.
    fn delay(&self, attempt: u32, rng: &mut StdRng) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(2u32.pow(exponent))
            .min(self.max_delay);
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rng.gen_range(0..=self.jitter.as_millis().max(1)) as u64;
            base + Duration::from_millis(jitter_ms)
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Why a retry loop stopped without a value.
#[derive(Debug)]
pub enum RetryError<E> {
    Cancelled { attempts: u32 },
    /// The budget ran out while an attempt was still in flight.
    Exhausted { attempts: u32 },
    /// Non-retryable error, or the last error once the budget ran out.
    Failed { attempts: u32, error: E },
}

/// Backoff scheduler with its own seeded jitter source.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    rng: Mutex<StdRng>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seed the jitter source for deterministic testing.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            policy: self.policy,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.policy.delay(attempt, &mut self.rng.lock())
    }

    /// Run `operation` until it succeeds, fails with an error `retryable` rejects,
    /// or `budget` is spent. Returns the value and the number of attempts made.
    ///
    /// A retry is only scheduled if its delay still ends inside the budget, and
    /// an attempt still running when the budget ends is abandoned.
    pub async fn retry_when<T, E, F, Fut, P>(
        &self,
        budget: Duration,
        cancel: &CancellationToken,
        retryable: P,
        mut operation: F,
    ) -> Result<(T, u32), RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let deadline = Instant::now() + budget;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                result = operation(attempt) => match result {
                    Ok(value) => return Ok((value, attempt)),
                    Err(error) => error,
                },
                _ = sleep_until(deadline) => return Err(RetryError::Exhausted { attempts: attempt }),
            };
            if !retryable(&error) {
                return Err(RetryError::Failed {
                    attempts: attempt,
                    error,
                });
            }
            let delay = self.next_delay(attempt);
            if Instant::now() + delay > deadline {
                return Err(RetryError::Failed {
                    attempts: attempt,
                    error,
                });
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                _ = sleep(delay) => {}
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
