//! Bounded deployment queue with non-blocking admission.
//!
//! The producer half ([`DeployQueue`]) lives in the HTTP handlers and
//! never waits: a full buffer or a closed queue is reported immediately
//! so the caller can shed load. The consumer half ([`JobReceiver`]) is
//! shared by the worker pool and wakes on either a new item or closure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{Mutex, mpsc, watch};

use skylift_core::DeployRequest;

/// Why a non-blocking enqueue was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The buffer is at capacity. Load is shed instead of queued.
    #[error("queue full")]
    Full,
    /// Shutdown has closed the queue; no further work is accepted.
    #[error("queue closed")]
    Closed,
}

struct Shared {
    closed: AtomicBool,
    depth: AtomicUsize,
    closed_tx: watch::Sender<bool>,
}

/// Producer half of the deployment queue. Cheap to clone.
#[derive(Clone)]
pub struct DeployQueue {
    tx: mpsc::Sender<DeployRequest>,
    shared: Arc<Shared>,
}

/// Consumer half of the deployment queue, shared by all workers.
pub struct JobReceiver {
    rx: Mutex<mpsc::Receiver<DeployRequest>>,
    closed_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

/// Create a queue bounded at `capacity` buffered requests.
pub fn deploy_queue(capacity: usize) -> (DeployQueue, Arc<JobReceiver>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (closed_tx, closed_rx) = watch::channel(false);
    let shared = Arc::new(Shared {
        closed: AtomicBool::new(false),
        depth: AtomicUsize::new(0),
        closed_tx,
    });
    let queue = DeployQueue {
        tx,
        shared: Arc::clone(&shared),
    };
    let receiver = Arc::new(JobReceiver {
        rx: Mutex::new(rx),
        closed_rx,
        shared,
    });
    (queue, receiver)
}

impl DeployQueue {
    /// Admit a request without blocking.
    ///
    /// Requests enqueued before [`close`](Self::close) returns are
    /// guaranteed to be offered to the workers during the drain; an
    /// enqueue racing with `close` may be rejected with
    /// [`EnqueueError::Closed`] instead.
    pub fn enqueue(&self, request: DeployRequest) -> Result<(), EnqueueError> {
        if self.shared.closed.load(Ordering::Relaxed) {
            return Err(EnqueueError::Closed);
        }
        // Count before sending: a worker may receive and decrement the
        // moment try_send returns, so the increment must already be there.
        self.shared.depth.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared.depth.fetch_sub(1, Ordering::Relaxed);
                match e {
                    TrySendError::Full(_) => Err(EnqueueError::Full),
                    TrySendError::Closed(_) => Err(EnqueueError::Closed),
                }
            }
        }
    }

    /// Close the queue to new work. Idempotent; returns `true` only for
    /// the call that actually closed it. Buffered items stay available
    /// to the workers.
    pub fn close(&self) -> bool {
        let newly_closed = !self.shared.closed.swap(true, Ordering::Relaxed);
        if newly_closed {
            let _ = self.shared.closed_tx.send(true);
        }
        newly_closed
    }

    /// Number of buffered requests not yet picked up by a worker.
    pub fn depth(&self) -> usize {
        self.shared.depth.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed)
    }
}

impl JobReceiver {
    /// Wait for the next request, or for closure.
    ///
    /// Returns `None` only once the queue is closed and the buffer has
    /// been drained; a worker's consume loop exits at that point.
    pub async fn next_job(&self) -> Option<DeployRequest> {
        let mut rx = self.rx.lock().await;
        loop {
            if self.shared.closed.load(Ordering::Relaxed) {
                return match rx.try_recv() {
                    Ok(request) => {
                        self.shared.depth.fetch_sub(1, Ordering::Relaxed);
                        Some(request)
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
                };
            }
            let mut closed_rx = self.closed_rx.clone();
            if *closed_rx.borrow() {
                // Closure landed between the flag check and the clone.
                continue;
            }
            tokio::select! {
                item = rx.recv() => {
                    return item.map(|request| {
                        self.shared.depth.fetch_sub(1, Ordering::Relaxed);
                        request
                    });
                }
                _ = closed_rx.changed() => continue,
            }
        }
    }

    /// Number of buffered requests not yet picked up by a worker.
    pub fn depth(&self) -> usize {
        self.shared.depth.load(Ordering::Relaxed)
    }
}
