//! Failure governor: sliding-window circuit breaker, advisory only.

use std::collections::VecDeque;

/// Default window of tracked outcomes.
const DEFAULT_WINDOW: usize = 100;
/// Default failure count that trips the breaker.
const DEFAULT_THRESHOLD: usize = 50;

/// Tracks the most recent outcomes and reports when failures dominate.
///
/// The breaker never stops dispatch: a trip raises a warning while the
/// queue keeps draining so that every submitted file still yields a
/// result.
#[derive(Debug)]
pub struct FailureGovernor {
    window: VecDeque<bool>,
    window_size: usize,
    threshold: usize,
    tripped: bool,
}

impl FailureGovernor {
    /// Governor with the default window (100) and threshold (50).
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_WINDOW, DEFAULT_THRESHOLD)
    }

    /// Governor with explicit limits.
    #[must_use]
    pub fn with_limits(window_size: usize, threshold: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            threshold: threshold.max(1),
            tripped: false,
        }
    }

    /// Record one outcome. Returns true when this record trips the
    /// breaker (edge-triggered: repeated failures past the trip report
    /// false until the window recovers).
    pub fn record(&mut self, failed: bool) -> bool {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(failed);

        let failures = self.window.iter().filter(|&&f| f).count();
        let over = self.window.len() == self.window_size && failures >= self.threshold;
        let newly_tripped = over && !self.tripped;
        self.tripped = over;
        if newly_tripped {
            tracing::warn!(
                failures,
                window = self.window_size,
                "circuit breaker tripped; continuing to drain the queue"
            );
        }
        newly_tripped
    }

    /// Whether the breaker is currently tripped.
    #[must_use]
    pub const fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Failures currently inside the window.
    #[must_use]
    pub fn recent_failures(&self) -> usize {
        self.window.iter().filter(|&&f| f).count()
    }
}

impl Default for FailureGovernor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_only_with_a_full_window() {
        let mut governor = FailureGovernor::with_limits(10, 5);
        for _ in 0..9 {
            assert!(!governor.record(true));
        }
        // Tenth record fills the window; failures far above threshold.
        assert!(governor.record(true));
        assert!(governor.is_tripped());
    }

    #[test]
    fn trip_is_edge_triggered() {
        let mut governor = FailureGovernor::with_limits(4, 2);
        governor.record(true);
        governor.record(true);
        governor.record(true);
        assert!(governor.record(true));
        // Still failing, but already tripped.
        assert!(!governor.record(true));
        assert!(governor.is_tripped());
    }

    #[test]
    fn window_recovery_resets_the_breaker() {
        let mut governor = FailureGovernor::with_limits(4, 3);
        for _ in 0..4 {
            governor.record(true);
        }
        assert!(governor.is_tripped());
        for _ in 0..4 {
            governor.record(false);
        }
        assert!(!governor.is_tripped());
        assert_eq!(governor.recent_failures(), 0);
    }

    #[test]
    fn successes_keep_it_quiet() {
        let mut governor = FailureGovernor::new();
        for i in 0..200 {
            assert!(!governor.record(i % 3 == 0), "tripped at {i}");
        }
        assert!(!governor.is_tripped());
    }
}
