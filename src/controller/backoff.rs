//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliations. The delay grows
//! along the Fibonacci sequence from `min` and is capped at `max`, which
//! grows more slowly than exponential backoff.
//!
//! ## Usage
//!
//! ```rust
//! use gitlab_source_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_secs(15), Duration::from_secs(600));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(30));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(45));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, in whole seconds.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_secs = min.as_secs().max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max.as_secs().max(min_secs),
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        Duration::from_secs(result)
    }

    /// Restart the sequence from `min`
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}
