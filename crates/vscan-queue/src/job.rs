//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vscan_models::{JobId, VideoUpload};

/// Job to run object detection over an uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Unique job ID (same as the video ID)
    pub job_id: JobId,
    /// Stored upload
    pub video_path: PathBuf,
    /// Name results are stored under
    pub video_name: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(job_id: JobId, video_path: impl Into<PathBuf>, video_name: impl Into<String>) -> Self {
        Self {
            job_id,
            video_path: video_path.into(),
            video_name: video_name.into(),
            created_at: Utc::now(),
        }
    }

    /// Build the job for a registered upload.
    pub fn for_upload(upload: &VideoUpload) -> Self {
        Self::new(
            upload.video_id.clone(),
            upload.storage_path.clone(),
            upload.video_name.clone(),
        )
    }
}
