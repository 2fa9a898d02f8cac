//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{FailureKind, FetchFailure, FetchOutcome, ProviderId, SourceError};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay for retry `n` (0-based) is `base * 2^n`, capped at `max`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry number (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, max, jitter } => {
                let scale = 2_f64.powi(retry.min(30) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);

                if jitter {
                    apply_jitter(delay)
                } else {
                    delay
                }
            }
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let millis = delay.as_millis().min(u128::from(u64::MAX)) as u64;
    let spread = millis / 2;
    let offset = fastrand::u64(0..=spread * 2);
    Duration::from_millis((millis - spread).saturating_add(offset))
}

/// Retry policy applied to one provider call.
///
/// Transient errors ([`SourceError::retryable`]) are retried up to
/// `max_attempts` in total; terminal errors stop immediately. The policy
/// neither logs nor caches; callers observe attempts through the operation
/// they pass in.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Exponential policy from millisecond settings.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self::new(
            max_attempts,
            Backoff::Exponential {
                base: base_delay,
                max: max_delay,
                jitter,
            },
        )
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self::new(
            1,
            Backoff::Fixed {
                delay: Duration::ZERO,
            },
        )
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay awaited before attempt `attempt` (1-based). Zero for the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        self.backoff.delay(attempt - 2)
    }

    /// Runs `operation` until it succeeds, fails terminally, or attempts run
    /// out. Latency includes backoff.
    pub async fn execute<T, F, Fut>(&self, source: ProviderId, mut operation: F) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let started = Instant::now();
        let mut last_error: Option<SourceError> = None;

        for attempt in 1..=self.max_attempts {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => {
                    return FetchOutcome::Success {
                        value,
                        source,
                        latency_ms: elapsed_ms(started),
                        attempts: attempt,
                    };
                }
                Err(error) if !error.retryable() => {
                    return FetchOutcome::Failure(
                        FetchFailure::new(FailureKind::Terminal, error.message())
                            .with_source(source)
                            .with_attempts(attempt),
                    );
                }
                Err(error) => last_error = Some(error),
            }
        }

        let message = last_error
            .map(|error| error.message().to_owned())
            .unwrap_or_else(|| String::from("no attempt was made"));
        FetchOutcome::Failure(
            FetchFailure::new(FailureKind::Exhausted, message)
                .with_source(source)
                .with_attempts(self.max_attempts),
        )
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
