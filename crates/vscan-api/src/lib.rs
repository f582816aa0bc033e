//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload and job submission
//! - Job status polling backed by the in-process job registry
//! - Result, overlay frame, text log and video playback endpoints
//! - Security headers, request IDs and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
