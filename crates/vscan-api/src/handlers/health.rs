//! Health check and banner handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

const BANNER: &str = "VisionScan Video Analysis API

Upload videos and get per-frame object detection results.

Endpoints:
  POST   /upload-video                            Upload video for analysis
  GET    /processing-status/{video_id}            Check processing progress
  GET    /results/{video_name}                    Get analysis results
  GET    /segmented-frame/{video_name}/{frame_id} View annotated frames
  GET    /analysis-text/{video_name}              Get the text log
  GET    /video/{video_name}                      Stream the original upload
  DELETE /video/{video_id}                        Cancel and delete a video
";

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    /// Jobs waiting for a worker
    pub queue_depth: usize,
    /// Jobs currently known to the registry
    pub jobs_tracked: usize,
}

/// Plain-text service banner.
pub async fn root() -> &'static str {
    BANNER
}

/// Health check endpoint (liveness probe).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        queue_depth: state.queue.pending(),
        jobs_tracked: state.registry.len(),
    })
}
