//! Worker pool and the deployment executor seam.
//!
//! Workers are plain tokio tasks in a consume loop: take the next
//! request, run it through the [`DeployExecutor`], log the outcome,
//! repeat until the queue reports closure. An executor outcome is never
//! an error to the pool — the HTTP caller was answered at admission
//! time, so failures are only logged and counted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{error, info};

use skylift_core::DeployRequest;
use skylift_metrics::MetricsRegistry;

use crate::queue::JobReceiver;

/// Boxed future returned by a [`DeployExecutor`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = ExecOutcome> + Send + 'a>>;

/// Result of one deployment run.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub success: bool,
    /// Combined output of the run, kept for the failure log.
    pub output: String,
}

impl ExecOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Runs a single deployment to completion. Implementations must not
/// panic on failure; they report it through the outcome instead.
pub trait DeployExecutor: Send + Sync {
    fn execute<'a>(&'a self, request: &'a DeployRequest) -> ExecFuture<'a>;
}

/// Fixed set of long-lived worker tasks consuming the deploy queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

/// What [`WorkerPool::join`] observed within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Workers that exited before the deadline.
    pub finished: usize,
    /// Workers still running at the deadline. They are detached, not
    /// aborted: an in-flight deployment keeps running to completion.
    pub abandoned: usize,
}

impl WorkerPool {
    /// Spawn `size` workers consuming `jobs`.
    pub fn start(
        size: usize,
        jobs: Arc<JobReceiver>,
        executor: Arc<dyn DeployExecutor>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let handles = (0..size)
            .map(|worker_id| {
                let jobs = Arc::clone(&jobs);
                let executor = Arc::clone(&executor);
                let metrics = Arc::clone(&metrics);
                tokio::spawn(worker_loop(worker_id, jobs, executor, metrics))
            })
            .collect();
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit, bounded by `budget` overall.
    ///
    /// Workers that do not finish in time are left running detached;
    /// nothing observes them afterwards.
    pub async fn join(self, budget: Duration) -> DrainOutcome {
        let total = self.handles.len();
        let deadline = Instant::now() + budget;
        let mut finished = 0;
        for handle in self.handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if timeout(remaining, handle).await.is_ok() {
                finished += 1;
            }
        }
        DrainOutcome {
            finished,
            abandoned: total - finished,
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    jobs: Arc<JobReceiver>,
    executor: Arc<dyn DeployExecutor>,
    metrics: Arc<MetricsRegistry>,
) {
    info!(worker_id, "deployment worker started");
    while let Some(request) = jobs.next_job().await {
        let started = Instant::now();
        info!(
            worker_id,
            request_id = %request.request_id,
            campaign_id = %request.campaign_id,
            subdomain = %request.subdomain,
            "processing deployment"
        );
        let outcome = executor.execute(&request).await;
        let elapsed = started.elapsed();
        if outcome.success {
            info!(
                worker_id,
                request_id = %request.request_id,
                ?elapsed,
                "deployment completed"
            );
        } else {
            metrics.incr_failures();
            error!(
                worker_id,
                request_id = %request.request_id,
                ?elapsed,
                output = %outcome.output,
                "deployment failed"
            );
        }
    }
    info!(worker_id, "deployment worker shutting down");
}
