// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Optimistic-concurrency retry with jittered backoff.
//!
//! Every get-merge-write sequence runs inside [`retry_on_conflict`]. A write
//! rejected because the object changed since it was read (HTTP 409 `Conflict`)
//! re-runs the whole sequence against a fresh read. Any other error fails
//! immediately.

use crate::constants::{
    DEFAULT_RETRY_INITIAL_INTERVAL_MILLIS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_INTERVAL_MILLIS, DEFAULT_RETRY_MULTIPLIER,
    DEFAULT_RETRY_RANDOMIZATION_FACTOR,
};
use crate::errors::Result;
use crate::metrics;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (1.0 keeps the delay flat)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            multiplier,
            randomization_factor,
        }
    }

    /// Get the next backoff interval and advance the schedule.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        // clamp before converting: a large multiplier overflows Duration
        let next = (interval.as_secs_f64() * self.multiplier).min(self.max_interval.as_secs_f64());
        self.current_interval = Duration::try_from_secs_f64(next).unwrap_or(self.max_interval);

        jittered
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::rng();
        let jittered = rng.random_range(min..=max);

        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(interval)
    }
}

/// Bounds and schedule for conflict retries.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; 1 disables retries
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub randomization_factor: f64,
}

impl Default for RetryPolicy {
    /// 5 attempts, 10ms apart with ±10% jitter.
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_interval: Duration::from_millis(DEFAULT_RETRY_INITIAL_INTERVAL_MILLIS),
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_interval: Duration::from_millis(DEFAULT_RETRY_MAX_INTERVAL_MILLIS),
            randomization_factor: DEFAULT_RETRY_RANDOMIZATION_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` attempts with no delay in between.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: Duration::ZERO,
            multiplier: 1.0,
            max_interval: Duration::ZERO,
            randomization_factor: 0.0,
        }
    }

    /// A single attempt; conflicts are returned to the caller.
    #[must_use]
    pub fn single_attempt() -> Self {
        Self::immediate(1)
    }

    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_interval,
            self.max_interval,
            self.multiplier,
            self.randomization_factor,
        )
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// `policy.max_attempts` is reached.
///
/// # Arguments
///
/// * `policy` - Attempt bound and delay schedule
/// * `kind` - `Kind.group` of the object, for metrics
/// * `operation_name` - Human-readable name for logging (e.g., "ensure ConfigMap/ns/name")
/// * `operation` - Async closure performing one read-merge-write pass
///
/// # Errors
///
/// Returns the first non-conflict error, or the last conflict once attempts
/// are exhausted.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    kind: &str,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = policy.backoff();
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Operation succeeded after conflict retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_conflict() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                error!(
                    operation = operation_name,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    error = %e,
                    "Conflict retries exhausted, giving up"
                );
                return Err(e);
            }
            Err(e) => {
                let duration = backoff.next_backoff();
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Write conflict, retrying with a fresh read"
                );
                metrics::record_conflict_retry(kind);
                if !duration.is_zero() {
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
