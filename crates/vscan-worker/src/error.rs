//! Worker error types.

use thiserror::Error;
use vscan_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Why a job stopped. The variant decides the error code recorded on the job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No frames could be extracted from the video")]
    EmptyExtraction,

    #[error("Frame analysis failed: {0}")]
    AnalysisFailure(String),

    #[error("Failed to persist results: {0}")]
    PersistenceFailure(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Queue error: {0}")]
    Queue(#[from] vscan_queue::QueueError),
}

impl WorkerError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailure(msg.into())
    }

    pub fn persistence_failed(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }

    /// Map an error raised while starting frame extraction.
    pub fn from_extraction(err: MediaError) -> Self {
        match err {
            MediaError::EmptyExtraction => Self::EmptyExtraction,
            e if e.is_source_error() => Self::SourceUnavailable(e.to_string()),
            e => Self::AnalysisFailure(e.to_string()),
        }
    }

    /// Stable machine-readable code recorded on failed jobs.
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::SourceUnavailable(_) => "source_unavailable",
            WorkerError::EmptyExtraction => "empty_extraction",
            WorkerError::AnalysisFailure(_) => "analysis_failure",
            WorkerError::PersistenceFailure(_) => "persistence_failure",
            WorkerError::Cancelled => "cancelled",
            WorkerError::Queue(_) => "internal_error",
        }
    }
}

impl From<vscan_storage::StorageError> for WorkerError {
    fn from(err: vscan_storage::StorageError) -> Self {
        Self::PersistenceFailure(err.to_string())
    }
}
