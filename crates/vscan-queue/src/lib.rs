//! In-process job queue for VisionScan.
//!
//! This crate provides:
//! - A bounded FIFO of analysis jobs between the API and the worker
//! - The job registry: one watched record per job, readable while a worker
//!   is writing it
//! - Per-job cancellation flags

pub mod error;
pub mod job;
pub mod queue;
pub mod registry;

pub use error::{QueueError, QueueResult};
pub use job::AnalysisJob;
pub use queue::{JobQueue, JobReceiver, QueueConfig};
pub use registry::{JobHandle, JobRegistry};
