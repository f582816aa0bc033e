//! Filesystem-backed result store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use vscan_models::{is_supported_video, stored_filename, JobId, ResultDocument};

use crate::error::{StorageError, StorageResult};

/// Directories the store writes into.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where uploaded videos are kept
    pub upload_dir: PathBuf,
    /// Where result documents are written
    pub results_dir: PathBuf,
    /// Where overlay frames are written
    pub frames_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploaded_videos"),
            results_dir: PathBuf::from("output_frames"),
            frames_dir: PathBuf::from("segmented_frames"),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            results_dir: std::env::var("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            frames_dir: std::env::var("FRAMES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frames_dir),
        }
    }

    /// All three directories rooted under `base`.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            upload_dir: base.join("uploaded_videos"),
            results_dir: base.join("output_frames"),
            frames_dir: base.join("segmented_frames"),
        }
    }
}

/// Uploads, overlay frames and result documents on local disk.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    config: StorageConfig,
}

impl FsResultStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(StorageConfig::from_env())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create the storage directories if missing.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [
            &self.config.upload_dir,
            &self.config.results_dir,
            &self.config.frames_dir,
        ] {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    // ----- uploads -----

    /// Open a new upload file for `{video_id}_{filename}`.
    pub async fn begin_upload(
        &self,
        video_id: &JobId,
        original_filename: &str,
    ) -> StorageResult<UploadWriter> {
        fs::create_dir_all(&self.config.upload_dir).await?;
        let path = self
            .config
            .upload_dir
            .join(stored_filename(video_id, original_filename));

        let file = fs::File::create(&path)
            .await
            .map_err(|e| StorageError::write_failed(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Upload started");
        Ok(UploadWriter {
            path,
            file,
            written: 0,
        })
    }

    /// Find a stored upload by its video name.
    pub async fn find_upload(&self, video_name: &str) -> StorageResult<PathBuf> {
        validate_name(video_name)?;

        let mut entries = match fs::read_dir(&self.config.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(video_name))
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches_stem = path.file_stem().and_then(|s| s.to_str()) == Some(video_name);
            let supported = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(is_supported_video)
                .unwrap_or(false);
            if matches_stem && supported {
                return Ok(path);
            }
        }

        Err(StorageError::not_found(video_name))
    }

    /// Delete a stored upload. Returns `false` if it was already gone.
    pub async fn delete_upload(&self, path: &Path) -> StorageResult<bool> {
        if !path.starts_with(&self.config.upload_dir) {
            return Err(StorageError::InvalidName(path.display().to_string()));
        }

        match fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Deleted upload");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::delete_failed(format!("{}: {}", path.display(), e))),
        }
    }

    // ----- overlay frames -----

    /// `{frames_dir}/{video_name}_frame_{frame_id:03}.jpg`
    pub fn frame_artifact_path(&self, video_name: &str, frame_id: u32) -> StorageResult<PathBuf> {
        validate_name(video_name)?;
        Ok(self
            .config
            .frames_dir
            .join(format!("{}_frame_{:03}.jpg", video_name, frame_id)))
    }

    /// Write an encoded overlay frame and return where it landed.
    pub async fn write_frame_artifact(
        &self,
        video_name: &str,
        frame_id: u32,
        jpeg: &[u8],
    ) -> StorageResult<PathBuf> {
        let path = self.frame_artifact_path(video_name, frame_id)?;
        fs::create_dir_all(&self.config.frames_dir).await?;
        fs::write(&path, jpeg)
            .await
            .map_err(|e| StorageError::write_failed(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    pub async fn read_frame_artifact(&self, video_name: &str, frame_id: u32) -> StorageResult<Vec<u8>> {
        let path = self.frame_artifact_path(video_name, frame_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(format!(
                "{} frame {}",
                video_name, frame_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    // ----- result documents -----

    /// `{results_dir}/{video_name}_analysis.json`
    pub fn results_path(&self, video_name: &str) -> StorageResult<PathBuf> {
        validate_name(video_name)?;
        Ok(self
            .config
            .results_dir
            .join(format!("{}_analysis.json", video_name)))
    }

    /// Persist a result document.
    ///
    /// Written to a temporary file in the same directory and renamed into
    /// place, so readers never observe a partial document.
    pub async fn write_results(&self, doc: &ResultDocument) -> StorageResult<PathBuf> {
        let path = self.results_path(&doc.video_name)?;
        let tmp = self
            .config
            .results_dir
            .join(format!(".{}_analysis.json.tmp", doc.video_name));

        fs::create_dir_all(&self.config.results_dir).await?;
        let json = serde_json::to_vec_pretty(doc)?;

        if let Err(e) = write_then_rename(&tmp, &path, &json).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %tmp.display(), "Failed to remove temp file: {}", cleanup);
                }
            }
            return Err(StorageError::write_failed(format!("{}: {}", path.display(), e)));
        }

        info!(
            path = %path.display(),
            frames = doc.frames.len(),
            "Result document written"
        );
        Ok(path)
    }

    /// Load a result document by video name.
    pub async fn load_results(&self, video_name: &str) -> StorageResult<ResultDocument> {
        let path = self.results_path(video_name)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(video_name))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, dest).await
}

/// Reject names that could escape the storage directories.
///
/// Stored names always carry a `{video_id}_` prefix, so a leading `.` already
/// covers `.` and `..`; dots inside the name are ordinary characters.
fn validate_name(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// An upload being streamed to disk.
pub struct UploadWriter {
    path: PathBuf,
    file: fs::File,
    written: u64,
}

impl UploadWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and close. Returns the stored path and size.
    pub async fn finish(mut self) -> StorageResult<(PathBuf, u64)> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        debug!(path = %self.path.display(), bytes = self.written, "Upload stored");
        Ok((self.path, self.written))
    }

    /// Drop the partial file.
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), "Failed to remove partial upload: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscan_models::{BoundingBox, Detection, FrameResult};

    fn store() -> (tempfile::TempDir, FsResultStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(StorageConfig::rooted_at(dir.path()));
        (dir, store)
    }

    fn document(video_name: &str) -> ResultDocument {
        let det = Detection::new("car", 0.8, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        let frames = vec![
            FrameResult::new(0, 0, 0.0, vec![det], "Traffic view showing 1 car", "a.jpg"),
            FrameResult::new(1, 15, 0.5, vec![], "Clear view with no detected objects", "b.jpg"),
        ];
        ResultDocument::new(video_name, JobId::from("job"), 0.5, frames)
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("1234_ride").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("1234_my..ride").is_ok());
        assert!(validate_name("1234_clip..").is_ok());
    }

    #[tokio::test]
    async fn test_dotted_upload_name_is_usable() {
        let (_dir, store) = store();
        let id = JobId::from("p9");

        let mut writer = store.begin_upload(&id, "my..ride.mp4").await.unwrap();
        writer.write_chunk(b"data").await.unwrap();
        let (path, _) = writer.finish().await.unwrap();
        let name = vscan_models::derive_video_name(&path);
        assert_eq!(name, "p9_my..ride");

        assert_eq!(store.find_upload(&name).await.unwrap(), path);
        tokio_test::assert_ok!(store.write_frame_artifact(&name, 0, b"jpeg").await);
        tokio_test::assert_ok!(store.write_results(&document(&name)).await);
        assert_eq!(store.load_results(&name).await.unwrap().video_name, name);
    }

    #[tokio::test]
    async fn test_results_roundtrip_and_idempotent_reads() {
        let (_dir, store) = store();
        let doc = document("job_ride");

        let path = store.write_results(&doc).await.unwrap();
        assert!(path.ends_with("job_ride_analysis.json"));

        let first = store.load_results("job_ride").await.unwrap();
        let second = store.load_results("job_ride").await.unwrap();
        assert_eq!(first, doc);
        assert_eq!(first, second);

        // No temp file is left behind.
        let mut entries = fs::read_dir(&store.config().results_dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["job_ride_analysis.json".to_string()]);
    }

    #[tokio::test]
    async fn test_load_unknown_or_invalid_is_not_found() {
        let (_dir, store) = store();
        let err = store.load_results("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store.load_results("../secret").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_frame_artifacts() {
        let (_dir, store) = store();
        let path = store.write_frame_artifact("vid", 7, b"jpeg").await.unwrap();
        assert!(path.ends_with("vid_frame_007.jpg"));
        assert_eq!(store.read_frame_artifact("vid", 7).await.unwrap(), b"jpeg");
        assert!(store.read_frame_artifact("vid", 8).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_upload_lifecycle() {
        let (_dir, store) = store();
        let id = JobId::from("abc");

        let mut writer = store.begin_upload(&id, "ride.mp4").await.unwrap();
        tokio_test::assert_ok!(writer.write_chunk(b"hello ").await);
        tokio_test::assert_ok!(writer.write_chunk(b"world").await);
        let (path, size) = tokio_test::assert_ok!(writer.finish().await);
        assert_eq!(size, 11);
        assert!(path.ends_with("abc_ride.mp4"));

        assert_eq!(store.find_upload("abc_ride").await.unwrap(), path);
        assert!(store.find_upload("other").await.unwrap_err().is_not_found());

        assert!(store.delete_upload(&path).await.unwrap());
        assert!(!store.delete_upload(&path).await.unwrap());
        assert!(store.find_upload("abc_ride").await.is_err());
    }

    #[tokio::test]
    async fn test_aborted_upload_is_removed() {
        let (_dir, store) = store();
        let mut writer = store.begin_upload(&JobId::from("x"), "a.mov").await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        let path = writer.path().to_path_buf();
        writer.abort().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_outside_upload_dir_rejected() {
        let (_dir, store) = store();
        let err = store.delete_upload(Path::new("/etc/passwd")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }
}
