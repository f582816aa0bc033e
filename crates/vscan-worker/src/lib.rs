//! Video analysis worker.
//!
//! This crate provides:
//! - Job executor with a bounded analysis pool
//! - The per-job pipeline: sample, detect, render, describe, persist
//! - Scene descriptions built from detection counts
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod scene_description;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::{process_job, ProcessingContext};
pub use scene_description::describe_scene;
