//! Per-frame results and the persisted result document.

use serde::{Deserialize, Serialize};

use crate::{Detection, JobId};

/// Output for one processed frame.
///
/// Created once per frame and appended to the job's result sequence in
/// increasing `frame_id` order; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Position in the sampled sequence (0-based)
    pub frame_id: u32,
    /// Index of the frame in the source video
    pub source_frame_index: u64,
    /// Seconds from the start of the video
    pub timestamp: f64,
    /// `MM:SS` rendering of `timestamp`
    pub time_formatted: String,
    /// Generated scene description
    pub description: String,
    /// Detections in the detector's emission order
    pub detected_objects: Vec<Detection>,
    pub total_detections: usize,
    /// Where the overlay image was written
    pub segmented_frame_path: String,
}

impl FrameResult {
    pub fn new(
        frame_id: u32,
        source_frame_index: u64,
        timestamp: f64,
        detected_objects: Vec<Detection>,
        description: impl Into<String>,
        segmented_frame_path: impl Into<String>,
    ) -> Self {
        Self {
            frame_id,
            source_frame_index,
            timestamp,
            time_formatted: format_timestamp(timestamp),
            description: description.into(),
            total_detections: detected_objects.len(),
            detected_objects,
            segmented_frame_path: segmented_frame_path.into(),
        }
    }
}

/// Everything persisted for one completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub video_name: String,
    pub job_id: JobId,
    pub frame_interval_seconds: f64,
    pub frames: Vec<FrameResult>,
}

impl ResultDocument {
    pub fn new(
        video_name: impl Into<String>,
        job_id: JobId,
        frame_interval_seconds: f64,
        frames: Vec<FrameResult>,
    ) -> Self {
        Self {
            video_name: video_name.into(),
            job_id,
            frame_interval_seconds,
            frames,
        }
    }

    /// Frames are strictly increasing in both index and timestamp.
    pub fn is_ordered(&self) -> bool {
        self.frames
            .windows(2)
            .all(|w| w[0].frame_id < w[1].frame_id && w[0].timestamp < w[1].timestamp)
    }

    /// Timestamp of the last analyzed frame.
    pub fn total_duration(&self) -> f64 {
        self.frames.last().map(|f| f.timestamp).unwrap_or(0.0)
    }

    pub fn total_detections(&self) -> usize {
        self.frames.iter().map(|f| f.total_detections).sum()
    }

    pub fn frames_with_detections(&self) -> usize {
        self.frames.iter().filter(|f| f.total_detections > 0).count()
    }

    /// One `[MM:SS] description` line per frame.
    pub fn text_log(&self) -> String {
        self.frames
            .iter()
            .map(|f| format!("[{}] {}", f.time_formatted, f.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Format seconds as `MM:SS` (minutes are not wrapped into hours).
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn frame(frame_id: u32, timestamp: f64, detections: usize) -> FrameResult {
        let dets = (0..detections)
            .map(|_| Detection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0)))
            .collect();
        FrameResult::new(frame_id, frame_id as u64 * 15, timestamp, dets, "desc", "x.jpg")
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(5.9), "00:05");
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(3600.0), "60:00");
        assert_eq!(format_timestamp(-3.0), "00:00");
    }

    #[test]
    fn test_document_summary() {
        let doc = ResultDocument::new(
            "abc_clip",
            JobId::from("abc"),
            0.5,
            vec![frame(0, 0.0, 2), frame(1, 0.5, 0), frame(2, 1.0, 1)],
        );
        assert!(doc.is_ordered());
        assert_eq!(doc.total_duration(), 1.0);
        assert_eq!(doc.total_detections(), 3);
        assert_eq!(doc.frames_with_detections(), 2);
        assert_eq!(doc.text_log(), "[00:00] desc\n[00:00] desc\n[00:01] desc");
    }

    #[test]
    fn test_unordered_document() {
        let doc = ResultDocument::new(
            "abc_clip",
            JobId::from("abc"),
            0.5,
            vec![frame(1, 0.5, 0), frame(0, 0.0, 0)],
        );
        assert!(!doc.is_ordered());
    }

    #[test]
    fn test_frame_counts_detections() {
        let f = frame(3, 1.5, 4);
        assert_eq!(f.total_detections, 4);
        assert_eq!(f.time_formatted, "00:01");
    }
}
