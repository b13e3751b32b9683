//! Metrics collection for pool monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Task counters
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_faulted: AtomicU64,
    tasks_rejected: AtomicU64,

    // Worker lifecycle
    workers_replaced: AtomicU64,

    // Dispatch-to-completion latency
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        // 3 significant figures, auto-resizing so long tasks never fail to record
        let mut histogram = Histogram::new(3).expect("3 significant figures is a valid precision");
        histogram.auto(true);

        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_faulted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            workers_replaced: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task that finished with a result
    pub fn record_completed(&self, latency_ns: u64) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a task the worker reported as failed
    pub fn record_failed(&self, latency_ns: u64) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a task lost to a worker fault
    pub fn record_faulted(&self) {
        self.tasks_faulted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record tasks rejected without running (shutdown, no workers)
    pub fn record_rejected(&self, count: u64) {
        self.tasks_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_worker_replaced(&self) {
        self.workers_replaced.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_ns: u64) {
        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(latency_ns.max(1));
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            timestamp: Some(Instant::now()),
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_faulted: self.tasks_faulted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            workers_replaced: self.workers_replaced.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.tasks_submitted.store(0, Ordering::Relaxed);
        self.tasks_completed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.tasks_faulted.store(0, Ordering::Relaxed);
        self.tasks_rejected.store(0, Ordering::Relaxed);
        self.workers_replaced.store(0, Ordering::Relaxed);

        self.latency_histogram.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub timestamp: Option<Instant>,
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_faulted: u64,
    pub tasks_rejected: u64,
    pub workers_replaced: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks that reached a terminal state
    pub fn tasks_settled(&self) -> u64 {
        self.tasks_completed + self.tasks_failed + self.tasks_faulted + self.tasks_rejected
    }

    /// Fraction of settled tasks that produced a result (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let settled = self.tasks_settled();
        if settled == 0 {
            return 0.0;
        }
        self.tasks_completed as f64 / settled as f64
    }

    /// Calculate completed tasks per second
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_completed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_completed(1000);
        metrics.record_failed(2000);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 2);
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.tasks_failed, 1);
        assert!(snapshot.avg_latency_ns > 0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();

        metrics.record_completed(1000);
        metrics.record_worker_replaced();
        assert_eq!(metrics.snapshot().tasks_completed, 1);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_completed, 0);
        assert_eq!(snapshot.workers_replaced, 0);
        assert_eq!(snapshot.max_latency_ns, 0);
    }

    #[test]
    fn test_success_rate() {
        let mut snapshot = MetricsSnapshot {
            tasks_completed: 3,
            tasks_failed: 1,
            ..Default::default()
        };

        assert_eq!(snapshot.success_rate(), 0.75);

        snapshot.tasks_faulted = 2;
        assert_eq!(snapshot.success_rate(), 0.5);
    }
}
