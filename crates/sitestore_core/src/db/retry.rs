//! Fibonacci-interval backoff for startup connectivity checks.
//!
//! # Invariants
//! - Delays follow `base * fib(n)` (1, 1, 2, 3, 5, ...) capped at `max_delay`.
//! - The number of attempts is always bounded by `max_attempts`.

use serde::Deserialize;
use std::time::Duration;

/// Bounded retry settings for the startup database ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    /// Policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delays to sleep between consecutive attempts.
    pub fn backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
        .take_attempts(self.max_attempts.saturating_sub(1))
    }
}

/// Iterator over Fibonacci-scaled delays.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    base: Duration,
    max: Duration,
    previous: u64,
    current: u64,
    remaining: Option<u32>,
}

impl FibonacciBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            previous: 0,
            current: 1,
            remaining: None,
        }
    }

    /// Limits the iterator to `count` delays.
    pub fn take_attempts(mut self, count: u32) -> Self {
        self.remaining = Some(count);
        self
    }
}

impl Iterator for FibonacciBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let factor = u32::try_from(self.current).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);

        let next = self.previous.saturating_add(self.current);
        self.previous = self.current;
        self.current = next;

        Some(delay)
    }
}
