//! Polling view of a job record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{JobRecord, JobStatus};

/// Snapshot returned to polling clients. `elapsed` is derived at read time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusView {
    pub video_id: String,
    pub filename: String,
    pub video_name: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub total_frames: u32,
    pub processed_frames: u32,
    /// `H:MM:SS` since the job was created (frozen once terminal)
    pub elapsed_time: String,
    pub elapsed_seconds: f64,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

impl JobStatusView {
    pub fn from_record(record: &JobRecord, now: DateTime<Utc>) -> Self {
        let end = record.finished_at.unwrap_or(now);
        let elapsed = (end - record.started_at).to_std().unwrap_or_default();

        Self {
            video_id: record.id.to_string(),
            filename: record.filename.clone(),
            video_name: record.video_name.clone(),
            status: record.status,
            progress: record.progress,
            current_step: record.current_step.clone(),
            total_frames: record.total_frames,
            processed_frames: record.processed_frames,
            elapsed_time: format_elapsed(elapsed.as_secs()),
            elapsed_seconds: elapsed.as_secs_f64(),
            error_message: record.error_message.clone(),
            error_code: record.error_code.clone(),
        }
    }
}

fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
