//! Delivery metrics for observability
//!
//! Counters describing one hook's delivery path: how many records were
//! queued, delivered, dropped under overload, or lost to sink failures.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single hook
///
/// # Example
///
/// ```
/// use log_hooks::DeliveryMetrics;
///
/// let metrics = DeliveryMetrics::new();
///
/// metrics.record_dropped();
/// metrics.record_delivered();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.delivered_count(), 1);
/// ```
#[derive(Debug)]
pub struct DeliveryMetrics {
    /// Records accepted onto the queue (or handed to a sync sink)
    enqueued: AtomicU64,

    /// Records the sink accepted
    delivered: AtomicU64,

    /// Records discarded because the queue was full or closed
    dropped: AtomicU64,

    /// Delivery attempts that returned an error or panicked
    failed: AtomicU64,

    /// Number of times a producer found the queue full
    queue_full_events: AtomicU64,

    /// Number of times a producer blocked waiting for queue space
    block_events: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Records accepted but not yet delivered, failed or drained
    pub fn in_flight(&self) -> u64 {
        self.enqueued_count()
            .saturating_sub(self.delivered_count() + self.failed_count())
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been fired yet.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.enqueued_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
    }
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DeliveryMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued_count()),
            delivered: AtomicU64::new(self.delivered_count()),
            dropped: AtomicU64::new(self.dropped_count()),
            failed: AtomicU64::new(self.failed_count()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = DeliveryMetrics::new();
        assert_eq!(metrics.enqueued_count(), 0);
        assert_eq!(metrics.delivered_count(), 0);
        assert_eq!(metrics.dropped_count(), 0);
        assert_eq!(metrics.failed_count(), 0);
        assert_eq!(metrics.block_events(), 0);
    }

    #[test]
    fn test_record_returns_previous() {
        let metrics = DeliveryMetrics::new();
        assert_eq!(metrics.record_dropped(), 0);
        assert_eq!(metrics.record_dropped(), 1);
        assert_eq!(metrics.dropped_count(), 2);
    }

    #[test]
    fn test_in_flight() {
        let metrics = DeliveryMetrics::new();
        for _ in 0..5 {
            metrics.record_enqueued();
        }
        metrics.record_delivered();
        metrics.record_failed();
        assert_eq!(metrics.in_flight(), 3);
    }

    #[test]
    fn test_drop_rate() {
        let metrics = DeliveryMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_enqueued();
        }
        for _ in 0..10 {
            metrics.record_dropped();
        }

        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let metrics = DeliveryMetrics::new();
        metrics.record_dropped();

        let snapshot = metrics.clone();
        metrics.record_dropped();

        assert_eq!(snapshot.dropped_count(), 1);
        assert_eq!(metrics.dropped_count(), 2);

        metrics.reset();
        assert_eq!(metrics.dropped_count(), 0);
    }
}
