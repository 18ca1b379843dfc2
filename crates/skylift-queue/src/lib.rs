//! skylift-queue — bounded deployment queue, worker pool, and shutdown.
//!
//! The admission path hands accepted deploy requests to a bounded FIFO
//! queue ([`deploy_queue`]). A fixed set of long-lived worker tasks
//! ([`WorkerPool`]) consumes the queue and runs each request through the
//! [`DeployExecutor`] seam, so the HTTP layer never blocks on a deployment.
//!
//! Shutdown is a one-shot sequence owned by [`ShutdownCoordinator`]:
//! close intake, drain the workers within a budget, report what was
//! finished and what was abandoned.

pub mod pool;
pub mod queue;
pub mod shutdown;

pub use pool::{DeployExecutor, DrainOutcome, ExecFuture, ExecOutcome, WorkerPool};
pub use queue::{DeployQueue, EnqueueError, JobReceiver, deploy_queue};
pub use shutdown::{DrainReport, LifecycleState, ShutdownCoordinator};
