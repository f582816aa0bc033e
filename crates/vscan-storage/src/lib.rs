//! Local filesystem storage for VisionScan.
//!
//! This crate provides:
//! - Streaming upload writes with cleanup on abort
//! - Overlay frame artifacts keyed by video name and frame id
//! - Atomic result document writes and idempotent reads

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{FsResultStore, StorageConfig, UploadWriter};
