//! Telemetry subsystem.
//!
//! Counts task outcomes and worker replacements and keeps a latency histogram
//! for monitoring pool behavior.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self { Self }
        pub fn record_submitted(&self) {}
        pub fn record_completed(&self, _: u64) {}
        pub fn record_failed(&self, _: u64) {}
        pub fn record_faulted(&self) {}
        pub fn record_rejected(&self, _: u64) {}
        pub fn record_worker_replaced(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot { MetricsSnapshot::default() }
        pub fn reset(&self) {}
    }

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
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
