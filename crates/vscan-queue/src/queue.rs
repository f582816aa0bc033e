//! Bounded in-process job queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::error::{QueueError, QueueResult};
use crate::job::AnalysisJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker before `enqueue` blocks
    pub depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { depth: 32 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            depth: std::env::var("WORKER_QUEUE_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d: &usize| *d > 0)
                .unwrap_or(32),
        }
    }
}

/// Producer side of the job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<AnalysisJob>,
    depth: usize,
}

/// Consumer side of the job queue, owned by the executor.
pub struct JobReceiver {
    rx: mpsc::Receiver<AnalysisJob>,
}

impl JobQueue {
    /// Create a connected queue pair.
    pub fn new(config: QueueConfig) -> (Self, JobReceiver) {
        let depth = config.depth.max(1);
        let (tx, rx) = mpsc::channel(depth);
        info!(depth, "Job queue created");
        (Self { tx, depth }, JobReceiver { rx })
    }

    /// Hand a job to the worker.
    ///
    /// Waits only for queue space, never for processing.
    pub async fn enqueue(&self, job: AnalysisJob) -> QueueResult<()> {
        let job_id = job.job_id.clone();
        self.tx.send(job).await.map_err(|_| QueueError::QueueClosed)?;
        debug!(job_id = %job_id, pending = self.pending(), "Job enqueued");
        Ok(())
    }

    /// Hand a job to the worker without waiting.
    ///
    /// Fails with `QueueFull` when every slot is taken, so callers never
    /// suspend between registering a job and dispatching it.
    pub fn try_enqueue(&self, job: AnalysisJob) -> QueueResult<()> {
        let job_id = job.job_id.clone();
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::QueueFull(self.depth),
            TrySendError::Closed(_) => QueueError::QueueClosed,
        })?;
        debug!(job_id = %job_id, pending = self.pending(), "Job enqueued");
        Ok(())
    }

    /// Jobs waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.depth.saturating_sub(self.tx.capacity())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobReceiver {
    /// Next job in FIFO order, `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<AnalysisJob> {
        self.rx.recv().await
    }

    /// Stop accepting new jobs; already queued jobs can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
