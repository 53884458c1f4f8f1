//! Relay metrics for observability
//!
//! Counters for monitoring relay health: how many events went through the
//! queue, how many took the synchronous fallback, how often producers were
//! held back, and how many events were lost or failed in a sink.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for relay observability
///
/// # Example
///
/// ```
/// use log_relay::RelayMetrics;
///
/// let metrics = RelayMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_dispatched();
///
/// assert_eq!(metrics.enqueued(), 1);
/// assert_eq!(metrics.dispatched(), 1);
/// assert_eq!(metrics.in_flight(), 0);
/// ```
#[derive(Debug)]
pub struct RelayMetrics {
    /// Events placed on the queue
    enqueued: AtomicU64,

    /// Events that reached every sink (or the backend) without failure
    dispatched: AtomicU64,

    /// Events delivered inline on the caller's thread
    sync_fallbacks: AtomicU64,

    /// Submits that found the queue full and had to wait
    blocked_submits: AtomicU64,

    /// Events abandoned because a blocked submit was cancelled
    lost_on_cancel: AtomicU64,

    /// Events for which at least one sink or the backend failed
    dispatch_failures: AtomicU64,

    /// Events refused because the relay had already shut down
    dropped_after_shutdown: AtomicU64,
}

impl RelayMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            sync_fallbacks: AtomicU64::new(0),
            blocked_submits: AtomicU64::new(0),
            lost_on_cancel: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            dropped_after_shutdown: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sync_fallbacks(&self) -> u64 {
        self.sync_fallbacks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn blocked_submits(&self) -> u64 {
        self.blocked_submits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lost_on_cancel(&self) -> u64 {
        self.lost_on_cancel.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_after_shutdown(&self) -> u64 {
        self.dropped_after_shutdown.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sync_fallback(&self) -> u64 {
        self.sync_fallbacks.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_blocked_submit(&self) -> u64 {
        self.blocked_submits.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_lost_on_cancel(&self) -> u64 {
        self.lost_on_cancel.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dispatch_failure(&self) -> u64 {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_after_shutdown(&self) -> u64 {
        self.dropped_after_shutdown.fetch_add(1, Ordering::Relaxed)
    }

    /// Move `count` queued events from `enqueued` to `dropped_after_shutdown`
    ///
    /// For events that were counted on the way in but found still queued once
    /// the worker had gone.
    pub fn record_reclaimed_after_shutdown(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.enqueued.fetch_sub(count, Ordering::Relaxed);
        self.dropped_after_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    /// Events handed to the queue whose processing has not been recorded yet
    ///
    /// Only meaningful while the worker runs; fallback deliveries are not queued.
    pub fn in_flight(&self) -> u64 {
        let processed = self.dispatched() + self.dispatch_failures();
        let queued_processed = processed.saturating_sub(self.sync_fallbacks());
        self.enqueued().saturating_sub(queued_processed)
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.dispatched.store(0, Ordering::Relaxed);
        self.sync_fallbacks.store(0, Ordering::Relaxed);
        self.blocked_submits.store(0, Ordering::Relaxed);
        self.lost_on_cancel.store(0, Ordering::Relaxed);
        self.dispatch_failures.store(0, Ordering::Relaxed);
        self.dropped_after_shutdown.store(0, Ordering::Relaxed);
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RelayMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            dispatched: AtomicU64::new(self.dispatched()),
            sync_fallbacks: AtomicU64::new(self.sync_fallbacks()),
            blocked_submits: AtomicU64::new(self.blocked_submits()),
            lost_on_cancel: AtomicU64::new(self.lost_on_cancel()),
            dispatch_failures: AtomicU64::new(self.dispatch_failures()),
            dropped_after_shutdown: AtomicU64::new(self.dropped_after_shutdown()),
        }
    }
}
