//! Fixed-interval frame sampling.
//!
//! The extractor decodes the source sequentially and forwards every
//! `stride`-th frame over a bounded channel. Memory is bounded by the channel
//! capacity rather than by video length, and the consumer starts analysing
//! the first sample while later ones are still being decoded.

use image::RgbImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::source::VideoSource;

/// How a source is sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    pub frame_rate: f64,
    /// Advertised frame count of the source
    pub source_frames: u64,
    /// Source frames between consecutive samples
    pub stride: u64,
    /// `ceil(source_frames / stride)`
    pub expected_samples: u32,
}

impl SamplingPlan {
    pub fn new(frame_rate: f64, source_frames: u64, interval_secs: f64) -> MediaResult<Self> {
        if !(interval_secs.is_finite() && interval_secs > 0.0) {
            return Err(MediaError::InvalidInterval(interval_secs));
        }
        // Timestamps are derived from the frame rate, so without one the
        // samples cannot be ordered in time.
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(MediaError::InvalidVideo(format!(
                "unusable frame rate {}",
                frame_rate
            )));
        }
        if source_frames == 0 {
            return Err(MediaError::EmptyExtraction);
        }

        let stride = ((frame_rate * interval_secs).round() as u64).max(1);
        let expected = source_frames.div_ceil(stride);

        Ok(Self {
            frame_rate,
            source_frames,
            stride,
            expected_samples: u32::try_from(expected).unwrap_or(u32::MAX),
        })
    }

    /// Seconds from the start of the video for a source frame.
    pub fn timestamp_of(&self, source_index: u64) -> f64 {
        source_index as f64 / self.frame_rate
    }
}

/// One sampled frame.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Position in the sampled sequence (0-based)
    pub frame_id: u32,
    /// Index of the frame in the source
    pub source_index: u64,
    /// Seconds from the start of the video
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Receiving end of a running extraction.
pub struct FrameStream {
    plan: SamplingPlan,
    rx: mpsc::Receiver<MediaResult<FrameSample>>,
    producer: JoinHandle<()>,
}

impl FrameStream {
    pub fn plan(&self) -> &SamplingPlan {
        &self.plan
    }

    /// Next sample in order, `None` once the source is exhausted.
    ///
    /// A decode error is yielded once and ends the stream.
    pub async fn next(&mut self) -> Option<MediaResult<FrameSample>> {
        self.rx.recv().await
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

/// Starts sampling extractions.
pub struct FrameExtractor;

impl FrameExtractor {
    /// Validate the source and spawn the decoding task.
    ///
    /// `buffer` is the number of decoded samples allowed to wait for the
    /// consumer.
    pub fn start(
        mut source: Box<dyn VideoSource>,
        interval_secs: f64,
        buffer: usize,
    ) -> MediaResult<FrameStream> {
        let plan = SamplingPlan::new(source.frame_rate(), source.frame_count(), interval_secs)?;
        let (tx, rx) = mpsc::channel(buffer.max(1));

        debug!(
            frame_rate = plan.frame_rate,
            source_frames = plan.source_frames,
            stride = plan.stride,
            expected_samples = plan.expected_samples,
            "Starting frame extraction"
        );

        let producer = tokio::spawn(async move {
            let mut source_index: u64 = 0;
            let mut frame_id: u32 = 0;

            loop {
                let image = match source.next_frame().await {
                    Ok(Some(image)) => image,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(source_index, "Frame decode failed: {}", e);
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                if source_index % plan.stride == 0 {
                    let sample = FrameSample {
                        frame_id,
                        source_index,
                        timestamp: plan.timestamp_of(source_index),
                        image,
                    };
                    if tx.send(Ok(sample)).await.is_err() {
                        debug!(frame_id, "Frame consumer hung up, stopping extraction");
                        return;
                    }
                    frame_id += 1;
                }
                source_index += 1;
            }

            if u64::from(frame_id) != u64::from(plan.expected_samples) {
                debug!(
                    expected = plan.expected_samples,
                    actual = frame_id,
                    decoded = source_index,
                    "Source frame count differed from header"
                );
            }
        });

        Ok(FrameStream { plan, rx, producer })
    }
}
