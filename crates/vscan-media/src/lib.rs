//! Video decoding and per-frame vision for VisionScan.
//!
//! This crate provides:
//! - FFprobe metadata and an FFmpeg raw-frame decoder behind [`VideoOpener`]
//! - Fixed-interval frame sampling over a bounded channel
//! - YOLOv8 object detection behind [`ObjectDetector`]
//! - Bounding-box overlays and JPEG encoding

pub mod detection;
pub mod error;
pub mod frames;
pub mod overlay;
pub mod probe;
pub mod source;

pub use detection::{ObjectDetector, ObjectDetectorConfig, YoloObjectDetector, COCO_CLASSES};
pub use error::{MediaError, MediaResult};
pub use frames::{FrameExtractor, FrameSample, FrameStream, SamplingPlan};
pub use overlay::{encode_jpeg, BoxOverlayRenderer, OverlayRenderer};
pub use probe::{probe_video, VideoInfo};
pub use source::{FfmpegVideoOpener, FfmpegVideoSource, VideoOpener, VideoSource};
