//! Worker configuration.

use std::time::Duration;

use vscan_media::ObjectDetectorConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs analysed at the same time (size of the analysis pool)
    pub max_concurrent_jobs: usize,
    /// Seconds between sampled frames
    pub frame_interval_secs: f64,
    /// Decoded samples allowed to wait for analysis
    pub frame_buffer: usize,
    /// Quality of the overlay JPEGs
    pub jpeg_quality: u8,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Object detector model settings
    pub detector: ObjectDetectorConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            frame_interval_secs: 0.5,
            frame_buffer: 4,
            jpeg_quality: 90,
            shutdown_timeout: Duration::from_secs(30),
            detector: ObjectDetectorConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            frame_interval_secs: std::env::var("FRAME_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.frame_interval_secs),
            frame_buffer: std::env::var("FRAME_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.frame_buffer),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|q: &u8| (1..=100).contains(q))
                .unwrap_or(defaults.jpeg_quality),
            shutdown_timeout: Duration::from_secs(
                std::env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            detector: ObjectDetectorConfig {
                model_path: std::env::var("DETECTOR_MODEL_PATH")
                    .unwrap_or(defaults.detector.model_path),
                confidence_threshold: std::env::var("DETECTOR_CONFIDENCE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.detector.confidence_threshold),
                ..defaults.detector
            },
        }
    }
}
