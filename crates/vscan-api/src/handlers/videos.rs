//! Video upload, status, playback and deletion handlers.

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use vscan_models::{is_supported_video, JobId, JobStatusView, VideoUpload};
use vscan_queue::AnalysisJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response for an accepted upload.
#[derive(Serialize)]
pub struct UploadResponse {
    pub video_id: String,
    pub filename: String,
    pub status: String,
    pub message: String,
    /// Name to use for results, frames and playback
    pub video_name: String,
    pub original_filename: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// POST /upload-video
///
/// Streams the multipart `file` field to disk, registers the job and hands
/// it to the worker. Returns as soon as the job is queued, or 503 when the
/// queue is full.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no filename"))?;

        if !is_supported_video(&filename) {
            return Err(ApiError::bad_request(
                "Only MP4, MOV, and AVI files are supported",
            ));
        }

        let video_id = JobId::new();
        let upload = store_upload(&state, &video_id, &filename, field).await?;
        return register_and_enqueue(&state, upload).await;
    }

    Err(ApiError::bad_request("Missing required 'file' field"))
}

async fn store_upload(
    state: &AppState,
    video_id: &JobId,
    filename: &str,
    mut field: Field<'_>,
) -> ApiResult<VideoUpload> {
    let mut writer = state.store.begin_upload(video_id, filename).await?;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = writer.write_chunk(&chunk).await {
                    writer.abort().await;
                    return Err(e.into());
                }
            }
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(multipart_error(e));
            }
        }
    }

    if writer.bytes_written() == 0 {
        writer.abort().await;
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }

    let (path, size) = writer.finish().await?;
    Ok(VideoUpload::new(video_id.clone(), filename, path, size))
}

async fn register_and_enqueue(
    state: &AppState,
    upload: VideoUpload,
) -> ApiResult<Json<UploadResponse>> {
    let job = AnalysisJob::for_upload(&upload);
    let response = UploadResponse {
        video_id: upload.video_id.to_string(),
        filename: upload.original_filename.clone(),
        status: "uploaded".to_string(),
        message: "Video uploaded successfully. Processing started.".to_string(),
        video_name: upload.video_name.clone(),
        original_filename: upload.original_filename.clone(),
    };
    let size = upload.size_bytes;
    let storage_path = upload.storage_path.clone();

    // No await between registering and dispatching: a dropped request
    // cannot leave a registered job that never reaches the worker.
    state.registry.register(upload)?;

    if let Err(e) = state.queue.try_enqueue(job) {
        warn!(video_id = %response.video_id, "Failed to enqueue job: {}", e);
        state.registry.remove(&JobId::from(response.video_id.as_str()));
        if let Err(cleanup) = state.store.delete_upload(&storage_path).await {
            warn!("Failed to remove orphaned upload: {}", cleanup);
        }
        return Err(e.into());
    }

    metrics::record_job_enqueued(size, state.queue.pending());
    info!(
        video_id = %response.video_id,
        video_name = %response.video_name,
        bytes = size,
        "Video uploaded and queued"
    );

    Ok(Json(response))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::bad_request(err.body_text())
    }
}

/// GET /processing-status/{video_id}
pub async fn get_processing_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    let record = state
        .registry
        .snapshot(&JobId::from(video_id.as_str()))
        .ok_or_else(|| ApiError::not_found("Video ID not found"))?;

    Ok(Json(JobStatusView::from_record(&record, Utc::now())))
}

/// GET /video/{video_name}
///
/// Streams the original upload.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(video_name): Path<String>,
) -> ApiResult<Response> {
    let not_found = || ApiError::not_found(format!("Video file for '{}' not found", video_name));

    let path = state.store.find_upload(&video_name).await.map_err(|e| {
        if e.is_not_found() {
            not_found()
        } else {
            e.into()
        }
    })?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// DELETE /video/{video_id}
///
/// Cancels the job if it is still running, forgets it and removes the
/// upload. Overlay frames and results already written stay in place.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let upload = state
        .registry
        .remove(&JobId::from(video_id.as_str()))
        .ok_or_else(|| ApiError::not_found("Video ID not found"))?;

    let removed = state.store.delete_upload(&upload.storage_path).await?;
    info!(video_id = %video_id, file_removed = removed, "Video deleted");

    Ok(Json(DeleteResponse {
        message: "Video deleted successfully".to_string(),
    }))
}
