//! Queue error types.

use thiserror::Error;
use vscan_models::TransitionError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Job queue is full ({0} pending), try again later")]
    QueueFull(usize),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),
}

impl QueueError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }
}
