//! Shared data models for the VisionScan backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and the processing state machine
//! - Object detections and bounding boxes
//! - Per-frame results and the persisted result document
//! - Upload metadata and status polling views

pub mod detection;
pub mod frame;
pub mod job;
pub mod job_status;
pub mod video;

// Re-export common types
pub use detection::{BoundingBox, Detection};
pub use frame::{format_timestamp, FrameResult, ResultDocument};
pub use job::{JobId, JobRecord, JobStatus, JobTransition, TransitionError};
pub use job_status::JobStatusView;
pub use video::{derive_video_name, is_supported_video, stored_filename, VideoUpload};
