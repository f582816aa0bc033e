//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use vscan_queue::{AnalysisJob, JobReceiver};

use crate::config::WorkerConfig;
use crate::processor::{process_job, ProcessingContext};

/// Pulls jobs off the queue and runs them on a bounded pool.
///
/// A permit is taken before the next job is received, so with a pool of one
/// the next job is not even dequeued until the current one is terminal.
pub struct JobExecutor {
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    max_jobs: usize,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(ctx: Arc<ProcessingContext>) -> Self {
        let max_jobs = ctx.config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            ctx,
            job_semaphore: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
            shutdown,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.ctx.config
    }

    /// Consume jobs until shutdown is signalled or the queue closes.
    pub async fn run(&self, mut jobs: JobReceiver) {
        info!(
            max_concurrent_jobs = self.max_jobs,
            frame_interval_secs = self.ctx.config.frame_interval_secs,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            let permit = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Job semaphore closed");
                        break;
                    }
                },
            };

            let job = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => {
                        info!("Job queue closed");
                        break;
                    }
                },
            };

            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(&ctx, job).await;
            });
        }

        jobs.close();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.ctx.config.shutdown_timeout.as_secs(),
                "Timed out waiting for in-flight jobs"
            );
        }

        info!("Job executor stopped");
    }

    async fn execute_job(ctx: &ProcessingContext, job: AnalysisJob) {
        let job_id = job.job_id.clone();
        debug!(job_id = %job_id, "Executing job");

        match process_job(ctx, &job).await {
            Ok(record) => {
                info!(
                    job_id = %job_id,
                    status = %record.status,
                    processed_frames = record.processed_frames,
                    "Job finished"
                );
            }
            Err(e) => {
                warn!(job_id = %job_id, "Job skipped: {}", e);
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.max_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Receiver that flips to `true` once shutdown is signalled.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}
