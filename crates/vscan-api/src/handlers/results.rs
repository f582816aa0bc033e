//! Result document, overlay frame and text log handlers.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use vscan_models::{FrameResult, ResultDocument};
use vscan_storage::StorageError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const ANALYSIS_TYPE: &str = "object_detection";

#[derive(Serialize)]
pub struct ResultsResponse {
    pub video_name: String,
    pub total_frames: usize,
    pub analysis_type: &'static str,
    pub results: Vec<FrameResult>,
}

#[derive(Serialize)]
pub struct SessionStats {
    /// Timestamp of the last analyzed frame, e.g. `12.5s`
    pub total_duration: String,
    pub frames_with_detections: usize,
    pub total_detections: usize,
}

#[derive(Serialize)]
pub struct AnalysisTextResponse {
    pub video_name: String,
    pub analysis_type: &'static str,
    pub text_analysis: String,
    pub total_segments: usize,
    pub session_stats: SessionStats,
}

async fn load_document(state: &AppState, video_name: &str) -> ApiResult<ResultDocument> {
    state
        .store
        .load_results(video_name)
        .await
        .map_err(|e| results_error(e, video_name))
}

fn results_error(err: StorageError, video_name: &str) -> ApiError {
    if err.is_not_found() {
        ApiError::not_found(format!(
            "Analysis results for '{}' not found. Process the video first.",
            video_name
        ))
    } else {
        err.into()
    }
}

/// GET /results/{video_name}
pub async fn get_results(
    State(state): State<AppState>,
    Path(video_name): Path<String>,
) -> ApiResult<Json<ResultsResponse>> {
    let doc = load_document(&state, &video_name).await?;

    Ok(Json(ResultsResponse {
        video_name,
        total_frames: doc.frames.len(),
        analysis_type: ANALYSIS_TYPE,
        results: doc.frames,
    }))
}

/// GET /segmented-frame/{video_name}/{frame_id}
pub async fn get_segmented_frame(
    State(state): State<AppState>,
    Path((video_name, frame_id)): Path<(String, u32)>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state
        .store
        .read_frame_artifact(&video_name, frame_id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::not_found(format!(
                    "Segmented frame {} for '{}' not found.",
                    frame_id, video_name
                ))
            } else {
                e.into()
            }
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "max-age=3600"),
        ],
        bytes,
    ))
}

/// GET /analysis-text/{video_name}
pub async fn get_analysis_text(
    State(state): State<AppState>,
    Path(video_name): Path<String>,
) -> ApiResult<Json<AnalysisTextResponse>> {
    let doc = load_document(&state, &video_name).await?;

    let total_duration = if doc.frames.is_empty() {
        "0s".to_string()
    } else {
        format!("{:.1}s", doc.total_duration())
    };

    Ok(Json(AnalysisTextResponse {
        text_analysis: doc.text_log(),
        total_segments: doc.frames.len(),
        session_stats: SessionStats {
            total_duration,
            frames_with_detections: doc.frames_with_detections(),
            total_detections: doc.total_detections(),
        },
        analysis_type: ANALYSIS_TYPE,
        video_name,
    }))
}
