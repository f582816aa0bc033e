//! Sequential access to decoded video frames.
//!
//! [`VideoOpener`] and [`VideoSource`] are the seam between the pipeline and
//! the decoder. The FFmpeg implementation probes the file with `ffprobe` and
//! then reads `rgb24` raw frames from an `ffmpeg` pipe one at a time, so only
//! a single decoded frame is held in memory by the source.

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// A decoded video read front to back.
#[async_trait]
pub trait VideoSource: Send {
    /// Frames per second reported by the container.
    fn frame_rate(&self) -> f64;

    /// Advertised number of frames (may differ from what decoding yields).
    fn frame_count(&self) -> u64;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Next frame in decode order, `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>>;
}

/// Opens stored videos for decoding.
#[async_trait]
pub trait VideoOpener: Send + Sync {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn VideoSource>>;
}

/// Opener backed by the `ffprobe`/`ffmpeg` CLIs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegVideoOpener;

impl FfmpegVideoOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoOpener for FfmpegVideoOpener {
    async fn open(&self, path: &Path) -> MediaResult<Box<dyn VideoSource>> {
        let info = probe_video(path).await.map_err(|e| {
            MediaError::source_unavailable(format!("{}: {}", path.display(), e))
        })?;

        if info.width == 0 || info.height == 0 {
            return Err(MediaError::source_unavailable(format!(
                "{}: video stream has no dimensions",
                path.display()
            )));
        }

        let source = FfmpegVideoSource::spawn(path, info)
            .map_err(|e| MediaError::source_unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(source))
    }
}

/// Raw-frame reader over an `ffmpeg` child process.
pub struct FfmpegVideoSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    reader: BufReader<ChildStdout>,
    frame_bytes: usize,
    finished: bool,
}

impl FfmpegVideoSource {
    fn spawn(path: &Path, info: VideoInfo) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-vsync", "0", "-pix_fmt", "rgb24", "-f", "rawvideo", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        let frame_bytes = info.width as usize * info.height as usize * 3;
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_count = info.frame_count,
            "Opened video for raw decoding"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            reader: BufReader::with_capacity(frame_bytes, stdout),
            frame_bytes,
            finished: false,
        })
    }

    async fn finish(&mut self) {
        self.finished = true;
        match self.child.wait().await {
            Ok(status) if !status.success() => {
                warn!(
                    path = %self.path.display(),
                    code = ?status.code(),
                    "FFmpeg exited with non-zero status"
                );
            }
            Err(e) => warn!(path = %self.path.display(), "FFmpeg wait failed: {}", e),
            _ => {}
        }
    }
}

#[async_trait]
impl VideoSource for FfmpegVideoSource {
    fn frame_rate(&self) -> f64 {
        self.info.fps
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    async fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_bytes];
        match self.reader.read_exact(&mut buffer).await {
            Ok(_) => {}
            // A truncated trailing frame is dropped like a clean end of stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish().await;
                return Ok(None);
            }
            Err(e) => {
                self.finish().await;
                return Err(MediaError::ffmpeg_failed(
                    format!("Failed to read FFmpeg output: {}", e),
                    None,
                    None,
                ));
            }
        }

        RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .map(Some)
            .ok_or_else(|| MediaError::internal("Failed to create image buffer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let opener = FfmpegVideoOpener::new();
        let err = opener
            .open(Path::new("/definitely/not/here.mp4"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::SourceUnavailable(_)));
        assert!(err.is_source_error());
    }
}
