//! Upload-time video metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::JobId;

/// Extensions accepted for upload.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Metadata recorded when a video is uploaded. Read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoUpload {
    /// Video ID (same value as the job ID)
    pub video_id: JobId,
    /// Filename as sent by the client
    pub original_filename: String,
    /// Where the upload was stored
    pub storage_path: PathBuf,
    /// Name used for result and artifact lookups
    pub video_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl VideoUpload {
    pub fn new(
        video_id: JobId,
        original_filename: impl Into<String>,
        storage_path: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        let storage_path = storage_path.into();
        Self {
            video_name: derive_video_name(&storage_path),
            video_id,
            original_filename: original_filename.into(),
            storage_path,
            uploaded_at: Utc::now(),
            size_bytes,
        }
    }
}

/// Check the filename carries a supported video extension (case-insensitive).
pub fn is_supported_video(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

/// Filename an upload is stored under: `{video_id}_{basename}`.
///
/// Any directory components sent by the client are dropped. Backslashes and
/// control characters become `_` so the derived video name stays addressable.
pub fn stored_filename(video_id: &JobId, original_filename: &str) -> String {
    let base: String = Path::new(original_filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video")
        .chars()
        .map(|c| if c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("{}_{}", video_id, base)
}

/// Name results are keyed by: the stem of the stored upload file.
pub fn derive_video_name(storage_path: &Path) -> String {
    storage_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
