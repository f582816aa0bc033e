//! Worker metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vscan_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vscan_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "vscan_job_duration_seconds";
    pub const FRAMES_ANALYZED_TOTAL: &str = "vscan_frames_analyzed_total";
    pub const FRAME_ANALYSIS_DURATION_SECONDS: &str = "vscan_frame_analysis_duration_seconds";
    pub const DETECTIONS_TOTAL: &str = "vscan_detections_total";
}

/// Record job completed.
pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// Record job failed.
pub fn record_job_failed(code: &str) {
    let labels = [("code", code.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record one analysed frame.
pub fn record_frame_analyzed(detections: usize, duration_secs: f64) {
    counter!(names::FRAMES_ANALYZED_TOTAL).increment(1);
    counter!(names::DETECTIONS_TOTAL).increment(detections as u64);
    histogram!(names::FRAME_ANALYSIS_DURATION_SECONDS).record(duration_secs);
}
