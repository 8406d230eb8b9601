// Engine metrics
//
// Lightweight counters for the watch manager and event bus. The active-watch
// gauge doubles as the probe tests use to prove native handles are released.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Shared engine metrics
///
/// Uses atomic operations for thread-safe metric tracking without locks.
#[derive(Debug)]
pub struct Metrics {
    /// Raw change signals received from native watches
    pub raw_events: AtomicU64,

    /// Debounced `changed` notifications published
    pub notifications_emitted: AtomicU64,

    /// Debounced notifications dropped because the session ended first
    pub notifications_suppressed: AtomicU64,

    /// Native watches created over the lifetime of the process
    pub watches_created: AtomicU64,

    /// Native watches currently held
    pub watches_active: AtomicUsize,

    /// Native watch failures reported as `watcher-error`
    pub watch_errors: AtomicU64,

    /// Events published on the bus
    pub broadcasts: AtomicU64,

    /// Events published while nobody was subscribed
    pub broadcast_misses: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            raw_events: AtomicU64::new(0),
            notifications_emitted: AtomicU64::new(0),
            notifications_suppressed: AtomicU64::new(0),
            watches_created: AtomicU64::new(0),
            watches_active: AtomicUsize::new(0),
            watch_errors: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            broadcast_misses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_raw_event(&self) {
        self.raw_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.notifications_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watch_created(&self) {
        self.watches_created.fetch_add(1, Ordering::Relaxed);
        self.watches_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watch_released(&self) {
        self.watches_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_watch_error(&self) {
        self.watch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast_miss(&self) {
        self.broadcast_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of native watches currently held
    pub fn active_watches(&self) -> usize {
        self.watches_active.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Engine Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Watches: {} created, {} active, {} errors",
            self.watches_created.load(Ordering::Relaxed),
            self.active_watches(),
            self.watch_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Raw events: {}, notifications: {} emitted, {} suppressed",
            self.raw_events.load(Ordering::Relaxed),
            self.notifications_emitted.load(Ordering::Relaxed),
            self.notifications_suppressed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Broadcasts: {}, without subscribers: {}",
            self.broadcasts.load(Ordering::Relaxed),
            self.broadcast_misses.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.active_watches(), 0);
        assert_eq!(metrics.raw_events.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_watch_gauge() {
        let metrics = Metrics::new();

        metrics.record_watch_created();
        metrics.record_watch_created();
        metrics.record_watch_released();

        assert_eq!(metrics.active_watches(), 1);
        assert_eq!(metrics.watches_created.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_notification_counters() {
        let metrics = Metrics::new();

        metrics.record_raw_event();
        metrics.record_raw_event();
        metrics.record_notification();
        metrics.record_suppressed();
        metrics.record_broadcast();
        metrics.record_broadcast_miss();

        assert_eq!(metrics.raw_events.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.notifications_emitted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.notifications_suppressed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.broadcasts.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.broadcast_misses.load(Ordering::Relaxed), 1);
    }
}
