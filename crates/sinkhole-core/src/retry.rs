//! Exponential backoff for the fallible cycle stages
//!
//! [`Backoff`] produces the sequence of delays allowed by a [`RetryPolicy`];
//! [`retry`] drives an async operation through it and stops early when the
//! shutdown signal fires during a delay.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RetryPolicy;
use crate::shutdown::ShutdownSignal;

/// Stateful delay generator for one retried operation
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    current: Duration,
    started: Instant,
    failures: u32,
}

impl Backoff {
    /// Start a fresh backoff sequence now
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
            current: policy.initial_interval(),
            started: Instant::now(),
            failures: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next
    ///
    /// Returns `None` when the policy does not allow another attempt.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;

        if let Some(max_attempts) = self.policy.max_attempts {
            if self.failures >= max_attempts {
                return None;
            }
        }

        let delay = self.randomized(self.current);

        if let Some(max_elapsed) = self.policy.max_elapsed() {
            if self.started.elapsed().saturating_add(delay) > max_elapsed {
                return None;
            }
        }

        let max_interval = self.policy.max_interval();
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.policy.multiplier)
            .unwrap_or(max_interval)
            .min(max_interval);

        Some(delay)
    }

    /// Failed attempts recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn randomized(&self, interval: Duration) -> Duration {
        let factor = self.policy.randomization_factor;
        if factor <= 0.0 {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = factor * secs;
        Duration::try_from_secs_f64(rand::rng().random_range((secs - delta)..=(secs + delta)))
            .unwrap_or(interval)
    }
}

/// Successful outcome of a retried operation
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts made, the successful one included
    pub attempts: u32,
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The policy ran out of attempts or time
    Exhausted { attempts: u32, last: E },
    /// The error was not eligible for retry
    Rejected { attempts: u32, error: E },
    /// Shutdown fired while waiting for the next attempt
    Cancelled { attempts: u32 },
}

/// Run `op` until it succeeds or the policy gives up
///
/// `retryable` decides per error whether another attempt is allowed at all.
/// `on_failure` is called for every failed attempt with the attempt number,
/// the error and the upcoming delay (`None` when giving up).
///
/// An attempt already in flight is never interrupted; shutdown is observed
/// between attempts only.
pub async fn retry<T, E, Op, Fut>(
    policy: &RetryPolicy,
    shutdown: &ShutdownSignal,
    retryable: impl Fn(&E) -> bool,
    mut on_failure: impl FnMut(u32, &E, Option<Duration>),
    mut op: Op,
) -> Result<Retried<T>, RetryFailure<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = Backoff::new(policy);

    loop {
        let attempt = backoff.failures() + 1;
        let error = match op(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => e,
        };

        if !retryable(&error) {
            on_failure(attempt, &error, None);
            return Err(RetryFailure::Rejected {
                attempts: attempt,
                error,
            });
        }

        let Some(delay) = backoff.next_delay() else {
            on_failure(attempt, &error, None);
            return Err(RetryFailure::Exhausted {
                attempts: attempt,
                last: error,
            });
        };
        on_failure(attempt, &error, Some(delay));

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.triggered() => {
                return Err(RetryFailure::Cancelled { attempts: attempt });
            }
        }
    }
}
