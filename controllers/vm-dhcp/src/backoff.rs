//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliation passes. Fibonacci
//! growth is gentler than exponential, which suits transient cache misses
//! and write conflicts that usually clear within a few seconds.
//!
//! Sequence with the defaults (5s min, 300s max): 5s, 5s, 10s, 15s, 25s,
//! 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max_secs`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds in seconds
    ///
    /// # Arguments
    ///
    /// * `min_secs` - First (and second) delay
    /// * `max_secs` - Upper bound for every delay
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            prev_secs: 0,
            current_secs: min_secs.min(max_secs),
            max_secs,
        }
    }

    /// Returns the next delay and advances the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;

        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);

        Duration::from_secs(result)
    }
}

/// Per-object backoffs keyed by `namespace/name`.
///
/// An entry exists only while its object keeps failing; a success drops it,
/// so the next failure starts again from the minimum delay.
#[derive(Debug)]
pub struct BackoffStates {
    min_secs: u64,
    max_secs: u64,
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffStates {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next retry delay for `key`
    pub fn next_backoff(&self, key: &str) -> Duration {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(self.min_secs, self.max_secs))
            .next_backoff()
    }

    pub fn reset(&self, key: &str) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
