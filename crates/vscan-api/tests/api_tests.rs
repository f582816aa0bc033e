//! HTTP surface tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use vscan_api::{create_router, ApiConfig, AppState};
use vscan_models::{BoundingBox, Detection, FrameResult, JobId, ResultDocument};
use vscan_queue::{JobQueue, JobReceiver, JobRegistry, QueueConfig};
use vscan_storage::{FsResultStore, StorageConfig};

const BOUNDARY: &str = "vscan-test-boundary";

struct TestApp {
    _dir: TempDir,
    router: Router,
    state: AppState,
    receiver: JobReceiver,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    async fn with_config(config: ApiConfig) -> Self {
        Self::build(config, 8).await
    }

    async fn build(config: ApiConfig, queue_depth: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let store = FsResultStore::new(StorageConfig::rooted_at(dir.path()));
        store.ensure_dirs().await.unwrap();

        let (queue, receiver) = JobQueue::new(QueueConfig { depth: queue_depth });
        let state = AppState::new(config, Arc::new(JobRegistry::new()), queue, store);
        let router = create_router(state.clone(), None);

        Self {
            _dir: dir,
            router,
            state,
            receiver,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn delete(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn upload(&self, field: &str, filename: &str, data: &[u8]) -> Response {
        self.send(multipart_request(field, filename, data)).await
    }
}

fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload-video")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn sample_document(video_name: &str) -> ResultDocument {
    let person = Detection::new("person", 0.91, BoundingBox::new(10.0, 20.0, 50.0, 120.0));
    ResultDocument::new(
        video_name,
        JobId::from("job-1"),
        0.5,
        vec![
            FrameResult::new(0, 0, 0.0, vec![person], "View showing 1 person", "f0.jpg"),
            FrameResult::new(
                1,
                15,
                1.5,
                vec![],
                "Clear view with no detected objects",
                "f1.jpg",
            ),
        ],
    )
}

#[tokio::test]
async fn test_root_and_health() {
    let app = TestApp::new().await;

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let banner = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(banner.contains("POST   /upload-video"));

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["queue_depth"], 0);
    assert_eq!(body["jobs_tracked"], 0);
}

#[tokio::test]
async fn test_security_and_request_id_headers() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let response = app.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upload_registers_and_queues_job() {
    let mut app = TestApp::new().await;

    let response = app.upload("file", "ride.mp4", b"not really a video").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let video_id = body["video_id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "uploaded");
    assert_eq!(body["filename"], "ride.mp4");
    assert_eq!(body["original_filename"], "ride.mp4");
    assert_eq!(body["video_name"], format!("{}_ride", video_id));

    let stored = app
        .state
        .store
        .config()
        .upload_dir
        .join(format!("{}_ride.mp4", video_id));
    assert_eq!(std::fs::read(&stored).unwrap(), b"not really a video");

    let job = app.receiver.recv().await.unwrap();
    assert_eq!(job.job_id.as_str(), video_id);
    assert_eq!(job.video_path, stored);

    let response = app.get(&format!("/processing-status/{}", video_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["video_id"], video_id.as_str());
    assert_eq!(status["status"], "uploaded");
    assert_eq!(status["progress"], 0);
    assert_eq!(status["current_step"], "File uploaded successfully");
    assert_eq!(status["total_frames"], 0);
    assert!(status["error_code"].is_null());
}

#[tokio::test]
async fn test_upload_with_dotted_filename_is_addressable() {
    let mut app = TestApp::new().await;

    let response = app.upload("file", "my..ride.mp4", b"dotted").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let video_id = body["video_id"].as_str().unwrap().to_string();
    let video_name = format!("{}_my..ride", video_id);
    assert_eq!(body["video_name"], video_name.as_str());

    let job = app.receiver.recv().await.unwrap();
    assert_eq!(job.video_name, video_name);

    let response = app.get(&format!("/video/{}", video_name)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"dotted");

    app.state
        .store
        .write_results(&sample_document(&video_name))
        .await
        .unwrap();
    let response = app.get(&format!("/results/{}", video_name)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_when_queue_full_is_503_and_cleans_up() {
    let app = TestApp::build(ApiConfig::default(), 1).await;

    let response = app.upload("file", "first.mp4", b"one").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.upload("file", "second.mp4", b"two").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Only the first job is tracked and only its upload remains.
    assert_eq!(app.state.registry.len(), 1);
    let stored: Vec<String> = std::fs::read_dir(&app.state.store.config().upload_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("_first.mp4"));
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = TestApp::new().await;

    let response = app.upload("file", "notes.txt", b"hello").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Only MP4, MOV, and AVI files are supported");
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let app = TestApp::new().await;

    let response = app.upload("attachment", "ride.mp4", b"data").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Missing required 'file' field");
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let app = TestApp::new().await;

    let response = app.upload("file", "ride.mov", b"").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let config = ApiConfig {
        max_upload_size: 64,
        ..ApiConfig::default()
    };
    let app = TestApp::with_config(config).await;

    let response = app.upload("file", "ride.mp4", &[0u8; 1024]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.state.registry.is_empty());
}

#[tokio::test]
async fn test_unknown_status_is_404() {
    let app = TestApp::new().await;

    let response = app.get("/processing-status/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Video ID not found");
}

#[tokio::test]
async fn test_results_and_analysis_text() {
    let app = TestApp::new().await;
    app.state
        .store
        .write_results(&sample_document("abc_clip"))
        .await
        .unwrap();

    let response = app.get("/results/abc_clip").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["video_name"], "abc_clip");
    assert_eq!(body["total_frames"], 2);
    assert_eq!(body["analysis_type"], "object_detection");
    assert_eq!(body["results"][0]["frame_id"], 0);
    assert_eq!(body["results"][0]["time_formatted"], "00:00");
    assert_eq!(body["results"][0]["detected_objects"][0]["class"], "person");
    assert_eq!(body["results"][1]["source_frame_index"], 15);

    let response = app.get("/analysis-text/abc_clip").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["text_analysis"],
        "[00:00] View showing 1 person\n[00:01] Clear view with no detected objects"
    );
    assert_eq!(body["total_segments"], 2);
    assert_eq!(body["session_stats"]["total_duration"], "1.5s");
    assert_eq!(body["session_stats"]["frames_with_detections"], 1);
    assert_eq!(body["session_stats"]["total_detections"], 1);
}

#[tokio::test]
async fn test_missing_results_are_404() {
    let app = TestApp::new().await;

    let response = app.get("/results/nothing_here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(
        body["detail"],
        "Analysis results for 'nothing_here' not found. Process the video first."
    );

    let response = app.get("/analysis-text/nothing_here").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_segmented_frame() {
    let app = TestApp::new().await;
    let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0xFF, 0xD9];
    app.state
        .store
        .write_frame_artifact("abc_clip", 2, &jpeg)
        .await
        .unwrap();

    let response = app.get("/segmented-frame/abc_clip/2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=3600");
    assert_eq!(body_bytes(response).await, jpeg);

    let response = app.get("/segmented-frame/abc_clip/9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "Segmented frame 9 for 'abc_clip' not found.");
}

#[tokio::test]
async fn test_stream_uploaded_video() {
    let app = TestApp::new().await;
    let content = b"\x00\x00\x00\x18ftypmp42 fake";

    let body = body_json(app.upload("file", "walk.mp4", content).await).await;
    let video_name = body["video_name"].as_str().unwrap().to_string();

    let response = app.get(&format!("/video/{}", video_name)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body_bytes(response).await, content);

    let response = app.get("/video/unknown_walk").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_video() {
    let app = TestApp::new().await;

    let body = body_json(app.upload("file", "walk.avi", b"avi bytes").await).await;
    let video_id = body["video_id"].as_str().unwrap().to_string();
    let upload_path = app
        .state
        .registry
        .upload(&JobId::from(video_id.as_str()))
        .unwrap()
        .storage_path;
    assert!(upload_path.exists());

    let response = app.delete(&format!("/video/{}", video_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Video deleted successfully");

    assert!(!upload_path.exists());
    let response = app.get(&format!("/processing-status/{}", video_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.delete(&format!("/video/{}", video_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
