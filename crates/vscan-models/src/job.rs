//! Job records and the processing state machine.
//!
//! A job moves `Uploaded -> Extracting -> Analyzing -> Complete`, with
//! `Error` reachable from `Extracting` or `Analyzing`. Every change to a
//! [`JobRecord`] goes through [`JobRecord::apply`], so the legal transitions
//! and the progress arithmetic live in one place and can be tested without
//! any I/O.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Progress reported once the job has been picked up by a worker.
pub const EXTRACTING_PROGRESS: u8 = 10;
/// Progress reported once frame extraction has produced a plan.
pub const ANALYZING_PROGRESS: u8 = 20;
/// Share of the progress bar covered by the per-frame analysis loop.
pub const ANALYSIS_SPAN: u8 = 70;
/// Progress of a completed job.
pub const COMPLETE_PROGRESS: u8 = 100;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Video stored, waiting for a worker
    #[default]
    Uploaded,
    /// Worker is sampling frames from the video
    Extracting,
    /// Frames are being run through detection
    Analyzing,
    /// Result document persisted
    Complete,
    /// Processing stopped with an error
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Extracting => "extracting",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single step of the job state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    /// The worker picked the job up.
    StartExtraction,
    /// Extraction produced a sampling plan with a known frame count.
    ExtractionComplete { total_frames: u32 },
    /// One more frame went through detection and was persisted.
    FrameAnalyzed { frame_id: u32 },
    /// The result document was written.
    Complete,
    /// Processing stopped.
    Fail { code: String, message: String },
}

impl JobTransition {
    pub fn fail(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fail {
            code: code.into(),
            message: message.into(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            JobTransition::StartExtraction => "start_extraction",
            JobTransition::ExtractionComplete { .. } => "extraction_complete",
            JobTransition::FrameAnalyzed { .. } => "frame_analyzed",
            JobTransition::Complete => "complete",
            JobTransition::Fail { .. } => "fail",
        }
    }
}

/// Rejected state machine step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("transition '{transition}' is not allowed from status '{from}'")]
    Illegal {
        from: JobStatus,
        transition: &'static str,
    },

    #[error("frame {got} analyzed out of order, expected frame {expected}")]
    OutOfOrder { expected: u32, got: u32 },
}

/// Mutable state of one processing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier (also the upload's video ID)
    pub id: JobId,
    /// Original upload filename
    pub filename: String,
    /// Name the results are stored under
    pub video_name: String,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable step description
    pub current_step: String,
    /// Number of sampled frames (0 until extraction completes)
    pub total_frames: u32,
    /// Frames analyzed so far
    pub processed_frames: u32,
    /// Creation timestamp
    pub started_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message (present iff status is `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Machine-readable error code (present iff status is `error`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl JobRecord {
    /// Create a record for a freshly uploaded video.
    pub fn new(id: JobId, filename: impl Into<String>, video_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: filename.into(),
            video_name: video_name.into(),
            status: JobStatus::Uploaded,
            progress: 0,
            current_step: "File uploaded successfully".to_string(),
            total_frames: 0,
            processed_frames: 0,
            started_at: now,
            updated_at: now,
            finished_at: None,
            error_message: None,
            error_code: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one state machine step.
    ///
    /// The record is left untouched when the step is rejected.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), TransitionError> {
        match (self.status, transition) {
            (JobStatus::Uploaded, JobTransition::StartExtraction) => {
                self.status = JobStatus::Extracting;
                self.raise_progress(EXTRACTING_PROGRESS);
                self.current_step = "Extracting frames from video...".to_string();
            }
            (JobStatus::Extracting, JobTransition::ExtractionComplete { total_frames }) => {
                self.status = JobStatus::Analyzing;
                self.total_frames = total_frames;
                self.raise_progress(ANALYZING_PROGRESS);
                self.current_step = format!(
                    "Extracted {} frames. Starting analysis...",
                    total_frames
                );
            }
            (JobStatus::Analyzing, JobTransition::FrameAnalyzed { frame_id }) => {
                if frame_id != self.processed_frames {
                    return Err(TransitionError::OutOfOrder {
                        expected: self.processed_frames,
                        got: frame_id,
                    });
                }
                self.processed_frames += 1;
                // The source produced more frames than its header advertised.
                if self.processed_frames > self.total_frames {
                    self.total_frames = self.processed_frames;
                }
                self.raise_progress(analysis_progress(self.processed_frames, self.total_frames));
                self.current_step = format!(
                    "Analyzing frame {}/{}...",
                    self.processed_frames, self.total_frames
                );
            }
            (JobStatus::Analyzing, JobTransition::Complete) => {
                self.status = JobStatus::Complete;
                self.total_frames = self.processed_frames;
                self.progress = COMPLETE_PROGRESS;
                self.current_step = format!(
                    "Analysis complete! Processed {} frames.",
                    self.processed_frames
                );
                self.finished_at = Some(Utc::now());
            }
            (JobStatus::Extracting | JobStatus::Analyzing, JobTransition::Fail { code, message }) => {
                self.status = JobStatus::Error;
                self.current_step = format!("Error during processing: {}", message);
                self.error_code = Some(code);
                self.error_message = Some(message);
                self.finished_at = Some(Utc::now());
            }
            (from, transition) => {
                return Err(TransitionError::Illegal {
                    from,
                    transition: transition.name(),
                })
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    fn raise_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(COMPLETE_PROGRESS));
    }
}

/// Progress for `processed` of `total` analyzed frames, spanning 20..=90.
pub fn analysis_progress(processed: u32, total: u32) -> u8 {
    if total == 0 {
        return ANALYZING_PROGRESS;
    }
    let processed = processed.min(total);
    let scaled = (f64::from(ANALYSIS_SPAN) * f64::from(processed) / f64::from(total)).round();
    ANALYZING_PROGRESS + scaled as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzing(total: u32) -> JobRecord {
        let mut record = JobRecord::new(JobId::new(), "clip.mp4", "abc_clip");
        record.apply(JobTransition::StartExtraction).unwrap();
        record
            .apply(JobTransition::ExtractionComplete { total_frames: total })
            .unwrap();
        record
    }

    #[test]
    fn test_new_record() {
        let record = JobRecord::new(JobId::from("job-1"), "clip.mp4", "job-1_clip");
        assert_eq!(record.status, JobStatus::Uploaded);
        assert_eq!(record.progress, 0);
        assert_eq!(record.current_step, "File uploaded successfully");
        assert!(record.error_message.is_none());
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        let mut record = JobRecord::new(JobId::new(), "clip.mp4", "abc_clip");

        record.apply(JobTransition::StartExtraction).unwrap();
        assert_eq!(record.status, JobStatus::Extracting);
        assert_eq!(record.progress, 10);

        record
            .apply(JobTransition::ExtractionComplete { total_frames: 4 })
            .unwrap();
        assert_eq!(record.status, JobStatus::Analyzing);
        assert_eq!(record.progress, 20);
        assert_eq!(record.total_frames, 4);

        let mut last = record.progress;
        for frame_id in 0..4 {
            record
                .apply(JobTransition::FrameAnalyzed { frame_id })
                .unwrap();
            assert!(record.progress >= last);
            assert!(record.processed_frames <= record.total_frames);
            last = record.progress;
        }
        assert_eq!(record.progress, 90);
        assert_eq!(record.current_step, "Analyzing frame 4/4...");

        record.apply(JobTransition::Complete).unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        assert_eq!(record.progress, 100);
        assert!(record.finished_at.is_some());
        assert!(record.is_terminal());
    }

    #[test]
    fn test_progress_rounding() {
        assert_eq!(analysis_progress(0, 3), 20);
        assert_eq!(analysis_progress(1, 3), 43);
        assert_eq!(analysis_progress(2, 3), 67);
        assert_eq!(analysis_progress(3, 3), 90);
        assert_eq!(analysis_progress(5, 3), 90);
        assert_eq!(analysis_progress(1, 0), 20);
    }

    #[test]
    fn test_failure_freezes_progress() {
        let mut record = analyzing(10);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 0 }).unwrap();
        let progress = record.progress;

        record
            .apply(JobTransition::fail("analysis_failure", "model crashed"))
            .unwrap();
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.progress, progress);
        assert_eq!(record.error_message.as_deref(), Some("model crashed"));
        assert_eq!(record.error_code.as_deref(), Some("analysis_failure"));
        assert_eq!(record.current_step, "Error during processing: model crashed");
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut record = analyzing(1);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 0 }).unwrap();
        record.apply(JobTransition::Complete).unwrap();

        let err = record
            .apply(JobTransition::fail("x", "late failure"))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                from: JobStatus::Complete,
                transition: "fail"
            }
        );
        assert_eq!(record.status, JobStatus::Complete);
        assert!(record.error_message.is_none());

        let mut failed = analyzing(2);
        failed.apply(JobTransition::fail("x", "boom")).unwrap();
        assert!(failed.apply(JobTransition::Complete).is_err());
        assert!(failed
            .apply(JobTransition::FrameAnalyzed { frame_id: 0 })
            .is_err());
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut record = JobRecord::new(JobId::new(), "clip.mp4", "abc_clip");
        assert!(record.apply(JobTransition::Complete).is_err());
        assert!(record
            .apply(JobTransition::ExtractionComplete { total_frames: 3 })
            .is_err());
        assert!(record.apply(JobTransition::fail("x", "y")).is_err());
        assert_eq!(record.status, JobStatus::Uploaded);
    }

    #[test]
    fn test_frames_must_arrive_in_order() {
        let mut record = analyzing(3);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 0 }).unwrap();
        let err = record
            .apply(JobTransition::FrameAnalyzed { frame_id: 2 })
            .unwrap_err();
        assert_eq!(err, TransitionError::OutOfOrder { expected: 1, got: 2 });
        assert_eq!(record.processed_frames, 1);
    }

    #[test]
    fn test_total_grows_when_source_overruns() {
        let mut record = analyzing(1);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 0 }).unwrap();
        assert_eq!(record.progress, 90);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 1 }).unwrap();
        assert_eq!(record.total_frames, 2);
        assert_eq!(record.processed_frames, 2);
        assert_eq!(record.progress, 90);
    }

    #[test]
    fn test_complete_trims_total_to_processed() {
        let mut record = analyzing(5);
        record.apply(JobTransition::FrameAnalyzed { frame_id: 0 }).unwrap();
        record.apply(JobTransition::FrameAnalyzed { frame_id: 1 }).unwrap();
        record.apply(JobTransition::Complete).unwrap();
        assert_eq!(record.total_frames, 2);
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&JobStatus::Analyzing).unwrap(), "\"analyzing\"");
        assert_eq!(JobStatus::Error.to_string(), "error");
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Extracting.is_terminal());
    }
}
