//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliations.
//!
//! The delay grows along the Fibonacci sequence (scaled by `min`) and is capped at `max`:
//! with `min = 5s` the sequence is 5s, 5s, 10s, 15s, 25s, 40s, ...

use std::time::Duration;

/// Fibonacci backoff state for a single resource
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: 1,
        }
    }

    /// Next delay in seconds, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.saturating_mul(self.min_secs).min(self.max_secs);
        let next = self.previous.saturating_add(self.current);
        self.previous = self.current;
        self.current = next;
        delay
    }

    /// Restart the sequence from `min`
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = 1;
    }

    /// Delay for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut delay = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            delay = backoff.next_backoff_seconds();
            if delay >= backoff.max_secs {
                break;
            }
        }
        Duration::from_secs(delay)
    }
}
