//! Per-job structured log lines.
//!
//! Every line carries `job_id`, and the span from [`JobLogger::span`] adds
//! `video_name` to anything logged while the job runs.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info, warn, Span};
use vscan_media::SamplingPlan;
use vscan_models::{FrameResult, JobId};

use crate::error::WorkerError;

/// Lifecycle logging for one analysis job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    video_name: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_name: &str) -> Self {
        Self {
            job_id: job_id.clone(),
            video_name: video_name.to_string(),
        }
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, video_name = %self.video_name)
    }

    pub fn started(&self, video_path: &Path) {
        info!(job_id = %self.job_id, path = %video_path.display(), "Analysis started");
    }

    /// How the source will be sampled, once the first frame decoded.
    pub fn sampling(&self, plan: &SamplingPlan) {
        info!(
            job_id = %self.job_id,
            stride = plan.stride,
            fps = plan.frame_rate,
            expected_frames = plan.expected_samples,
            "Sampling frames"
        );
    }

    pub fn frame(&self, result: &FrameResult) {
        debug!(
            job_id = %self.job_id,
            frame_id = result.frame_id,
            timestamp = result.timestamp,
            detections = result.total_detections,
            "{}", result.description
        );
    }

    /// The source produced a different number of samples than its header promised.
    pub fn frame_count_mismatch(&self, expected: u32, actual: usize) {
        warn!(job_id = %self.job_id, expected, actual, "Frame count differed from header");
    }

    pub fn completed(&self, processed_frames: u32, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            processed_frames,
            elapsed_secs = elapsed.as_secs_f64(),
            "Analysis complete"
        );
    }

    /// Cancellation is expected and logged as a warning; anything else is an error.
    pub fn failed(&self, err: &WorkerError) {
        match err {
            WorkerError::Cancelled => warn!(job_id = %self.job_id, "Analysis cancelled"),
            e => error!(job_id = %self.job_id, code = e.code(), "Analysis failed: {}", e),
        }
    }
}
