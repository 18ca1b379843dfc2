//! One-shot shutdown sequence for the deployment subsystem.
//!
//! Order matters: intake closes first so no new work lands, then the
//! workers get a bounded window to drain what is already buffered, and
//! the final metrics snapshot is logged before the process exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use skylift_metrics::MetricsRegistry;

use crate::pool::WorkerPool;
use crate::queue::DeployQueue;

/// Lifecycle of the deployment subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

/// What a completed shutdown left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub workers_finished: usize,
    pub workers_abandoned: usize,
    /// Requests still buffered when the drain budget ran out. They were
    /// admitted but will never run.
    pub items_abandoned: usize,
    pub drained_in_time: bool,
}

/// Owns the shutdown sequence: close intake, drain workers, report.
pub struct ShutdownCoordinator {
    queue: DeployQueue,
    pool: Mutex<Option<WorkerPool>>,
    metrics: Arc<MetricsRegistry>,
    drain_budget: Duration,
    state: AtomicU8,
}

impl ShutdownCoordinator {
    pub fn new(
        queue: DeployQueue,
        pool: WorkerPool,
        metrics: Arc<MetricsRegistry>,
        drain_budget: Duration,
    ) -> Self {
        Self {
            queue,
            pool: Mutex::new(Some(pool)),
            metrics,
            drain_budget,
            state: AtomicU8::new(LifecycleState::Running as u8),
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Relaxed) {
            0 => LifecycleState::Running,
            1 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }

    /// Run the shutdown sequence. Exactly one caller gets the report;
    /// any later or concurrent call is a no-op returning `None`.
    pub async fn shutdown(&self) -> Option<DrainReport> {
        let won = self
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::Draining as u8,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok();
        if !won {
            return None;
        }

        info!(budget = ?self.drain_budget, "beginning graceful shutdown");
        self.queue.close();
        info!(buffered = self.queue.depth(), "deployment queue closed");

        let pool = self.pool.lock().await.take();
        let report = match pool {
            Some(pool) => {
                let outcome = pool.join(self.drain_budget).await;
                let items_abandoned = self.queue.depth();
                if outcome.abandoned == 0 {
                    info!(workers = outcome.finished, "all deployment workers finished");
                } else {
                    warn!(
                        workers_abandoned = outcome.abandoned,
                        items_abandoned,
                        "drain budget elapsed, abandoning remaining work"
                    );
                }
                DrainReport {
                    workers_finished: outcome.finished,
                    workers_abandoned: outcome.abandoned,
                    items_abandoned,
                    drained_in_time: outcome.abandoned == 0,
                }
            }
            None => DrainReport {
                workers_finished: 0,
                workers_abandoned: 0,
                items_abandoned: self.queue.depth(),
                drained_in_time: true,
            },
        };

        let snapshot = self.metrics.snapshot();
        info!(
            total_requests = snapshot.request_count,
            total_deployments = snapshot.total_deployments,
            failed_requests = snapshot.failed_requests,
            uptime_secs = snapshot.uptime_secs,
            "final metrics before shutdown"
        );

        self.state
            .store(LifecycleState::Stopped as u8, Ordering::Relaxed);
        Some(report)
    }
}
