//! # Fibonacci Backoff
//!
//! Per-object retry delays for failed reconciliations. Delays follow the
//! Fibonacci sequence in minutes (1m, 1m, 2m, 3m, 5m, 8m, then the cap) so a
//! misconfigured cluster does not hammer the IBM Cloud APIs, while a transient
//! failure is retried quickly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shortest delay in minutes
pub const MIN_BACKOFF_MINUTES: u64 = 1;
/// Longest delay in minutes
pub const MAX_BACKOFF_MINUTES: u64 = 10;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the two before it, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Next delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result_seconds
    }

    /// Next delay as a `Duration`; advances the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Back to the first delay
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF_MINUTES, MAX_BACKOFF_MINUTES)
    }
}

/// Backoff state for a resource
#[derive(Debug, Clone, Default)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

/// Backoff state for every object currently failing, keyed by
/// `Kind/namespace/name`.
#[derive(Debug, Clone, Default)]
pub struct BackoffRegistry {
    states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl BackoffRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure of `key` and return the delay before the next attempt
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut states = match self.states.lock() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = states.entry(key.to_string()).or_default();
        state.error_count += 1;
        state.backoff.next_backoff()
    }

    /// Forget the failure history of `key` after a successful reconcile
    pub fn reset(&self, key: &str) {
        let mut states = match self.states.lock() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.remove(key);
    }

    /// Consecutive failures recorded for `key`
    pub fn error_count(&self, key: &str) -> u32 {
        let states = match self.states.lock() {
            Ok(states) => states,
            Err(poisoned) => poisoned.into_inner(),
        };
        states.get(key).map_or(0, |s| s.error_count)
    }
}
