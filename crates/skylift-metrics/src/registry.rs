//! Atomic metrics registry.
//!
//! Counters use relaxed atomics; none of them guard other memory, they
//! only need to count. The latency estimate is a recency-biased half
//! average computed in integer microseconds, not an arithmetic mean.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Process-wide counters, updated by handlers and workers.
#[derive(Debug)]
pub struct MetricsRegistry {
    /// Every request that entered the middleware chain.
    request_count: AtomicU64,
    /// Requests currently inside a handler.
    active_requests: AtomicI64,
    /// Deployments accepted onto the queue (admission, not completion).
    total_deployments: AtomicU64,
    /// Deployments whose executor run reported failure.
    failed_requests: AtomicU64,
    /// Decaying latency estimate in microseconds.
    avg_latency_us: AtomicU64,
    started: Instant,
}

/// Point-in-time view of the registry, serialized on `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub active_requests: i64,
    pub total_deployments: u64,
    pub failed_requests: u64,
    pub average_latency_ms: f64,
    pub uptime_secs: u64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            active_requests: AtomicI64::new(0),
            total_deployments: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            avg_latency_us: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn incr_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_active(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decr_active(&self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }

    /// Count a deployment accepted onto the queue.
    pub fn incr_deployments(&self) {
        self.total_deployments.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a deployment whose executor run failed.
    pub fn incr_failures(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a new latency sample into the decaying estimate.
    ///
    /// Update rule: `avg' = d` when `avg == 0`, else `avg' = (avg + d) / 2`.
    /// Each new sample carries roughly half the weight, so the estimate
    /// follows recent traffic rather than the lifetime mean.
    pub fn record_latency(&self, d: Duration) {
        let sample = d.as_micros() as u64;
        let mut current = self.avg_latency_us.load(Ordering::Relaxed);
        loop {
            let next = if current == 0 {
                sample
            } else {
                (current + sample) / 2
            };
            match self.avg_latency_us.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn average_latency(&self) -> Duration {
        Duration::from_micros(self.avg_latency_us.load(Ordering::Relaxed))
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            request_count: self.request_count.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            total_deployments: self.total_deployments.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_latency_ms: self.avg_latency_us.load(Ordering::Relaxed) as f64 / 1000.0,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
