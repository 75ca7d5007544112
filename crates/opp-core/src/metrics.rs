//! Counters for adjustment outcomes
//!
//! ## Usage
//!
//! ```ignore
//! let adjuster = VoltageAdjuster::new(registry);
//! adjuster.adjust_voltage(&cpu0, freq, 920_000, 870_000, 960_000)?;
//!
//! let snapshot = adjuster.metrics().snapshot();
//! assert_eq!(snapshot.changed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the voltage adjuster.
#[derive(Debug, Default)]
pub struct AdjustMetrics {
    /// Total adjust/enable/disable requests
    pub requests: AtomicU64,
    /// Voltage adjustments that changed an entry
    pub changed: AtomicU64,
    /// Requests that found nothing to change
    pub unchanged: AtomicU64,
    /// Requests naming an unknown device
    pub device_not_found: AtomicU64,
    /// Requests naming a frequency the table lacks
    pub frequency_not_found: AtomicU64,
    /// Enable/disable requests that flipped availability
    pub availability_changes: AtomicU64,
    /// Observer invocations across all notifications
    pub notifications_dispatched: AtomicU64,
    /// Notification rounds slower than the configured threshold
    pub slow_dispatches: AtomicU64,
}

impl AdjustMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_changed(&self) {
        self.changed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_not_found(&self) {
        self.device_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frequency_not_found(&self) {
        self.frequency_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_availability_change(&self) {
        self.availability_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one notification round
    ///
    /// # Arguments
    /// * `receivers` - Observers invoked
    /// * `slow` - Whether the round exceeded the threshold
    pub fn record_dispatch(&self, receivers: usize, slow: bool) {
        self.notifications_dispatched
            .fetch_add(receivers as u64, Ordering::Relaxed);
        if slow {
            self.slow_dispatches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            changed: self.changed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            device_not_found: self.device_not_found.load(Ordering::Relaxed),
            frequency_not_found: self.frequency_not_found.load(Ordering::Relaxed),
            availability_changes: self.availability_changes.load(Ordering::Relaxed),
            notifications_dispatched: self.notifications_dispatched.load(Ordering::Relaxed),
            slow_dispatches: self.slow_dispatches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`AdjustMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub device_not_found: u64,
    pub frequency_not_found: u64,
    pub availability_changes: u64,
    pub notifications_dispatched: u64,
    pub slow_dispatches: u64,
}

impl MetricsSnapshot {
    /// Requests that ended in an error
    pub fn failures(&self) -> u64 {
        self.device_not_found + self.frequency_not_found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = AdjustMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_changed();
        metrics.record_frequency_not_found();
        metrics.record_dispatch(3, false);
        metrics.record_dispatch(1, true);

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.changed, 1);
        assert_eq!(snap.failures(), 1);
        assert_eq!(snap.notifications_dispatched, 4);
        assert_eq!(snap.slow_dispatches, 1);
    }
}
