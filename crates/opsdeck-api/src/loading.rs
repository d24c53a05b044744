// Loading aggregation
//
// Process-wide count of in-flight dispatches, driving the UI's busy
// indicator. Saturating on the way down: a stray `end()` can never push
// the counter negative or wedge the busy flag on.

use tokio::sync::watch;

/// Saturating counter of in-flight requests with push-based change
/// notification via a `watch` channel.
pub struct LoadingTracker {
    count: watch::Sender<u64>,
}

impl Default for LoadingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingTracker {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    /// One more request in flight.
    pub fn begin(&self) {
        self.count.send_modify(|c| *c += 1);
    }

    /// One request settled. Clamped at zero.
    pub fn end(&self) {
        self.count.send_modify(|c| *c = c.saturating_sub(1));
    }

    /// Force the counter back to zero. Escape hatch for recovering from a
    /// lost decrement after an uncaught transport failure.
    pub fn reset(&self) {
        self.count.send_modify(|c| *c = 0);
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Busy projection: anything at all in flight.
    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }

    /// Subscribe to counter changes (e.g. a loading overlay).
    /// `send_modify` notifies even with zero receivers, so subscribing
    /// late never misses the current value.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn begin_end_balance_returns_to_zero() {
        let tracker = LoadingTracker::new();
        tracker.begin();
        tracker.begin();
        assert_eq!(tracker.count(), 2);
        assert!(tracker.is_busy());

        tracker.end();
        tracker.end();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.is_busy());
    }

    #[test]
    fn end_clamps_at_zero() {
        let tracker = LoadingTracker::new();
        tracker.end();
        tracker.end();
        assert_eq!(tracker.count(), 0);
        assert!(!tracker.is_busy());

        // Still functional after clamping.
        tracker.begin();
        assert!(tracker.is_busy());
    }

    #[test]
    fn reset_forces_zero() {
        let tracker = LoadingTracker::new();
        tracker.begin();
        tracker.begin();
        tracker.begin();
        tracker.reset();
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn subscribers_observe_changes() {
        let tracker = LoadingTracker::new();
        let mut rx = tracker.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        tracker.begin();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        tracker.end();
        assert_eq!(*rx.borrow_and_update(), 0);
    }
}
