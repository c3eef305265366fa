//! Backoff bookkeeping for the worker loop.
//!
//! Store failures are retried forever with a fixed delay; the tracker keeps
//! a dead database from flooding the log while still reporting recovery.

use std::fmt::Display;

use tracing::{info, warn};

/// Consecutive failure counter with log suppression.
#[derive(Debug)]
pub struct FailureTracker {
    operation: &'static str,
    consecutive_failures: u32,
    max_logged_failures: u32,
}

impl FailureTracker {
    /// Log at most `max_logged_failures` consecutive failures of `operation`.
    pub fn new(operation: &'static str, max_logged_failures: u32) -> Self {
        Self {
            operation,
            consecutive_failures: 0,
            max_logged_failures,
        }
    }

    /// Record a successful attempt, resetting the count.
    pub fn record_success(&mut self) {
        if self.consecutive_failures > self.max_logged_failures {
            info!(
                "{} recovered after {} consecutive failures",
                self.operation, self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    /// Record a failed attempt, logging it unless suppressed.
    ///
    /// Returns `true` if the failure was logged.
    pub fn record_failure(&mut self, error: &impl Display) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            warn!("{} failed: {}", self.operation, error);
            true
        } else {
            if self.consecutive_failures == self.max_logged_failures + 1 {
                warn!(
                    "{} failed {} times in a row, suppressing further failure logs: {}",
                    self.operation, self.consecutive_failures, error
                );
            }
            false
        }
    }

    /// Get the current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_tracker_suppression() {
        let mut tracker = FailureTracker::new("claim", 2);

        assert!(tracker.record_failure(&"locked"));
        assert!(tracker.record_failure(&"locked"));
        assert!(!tracker.record_failure(&"locked"));
        assert!(!tracker.record_failure(&"locked"));
        assert_eq!(tracker.failure_count(), 4);

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure(&"locked"));
    }
}
