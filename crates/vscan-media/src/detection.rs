//! Object detection using a YOLOv8 ONNX model.
//!
//! The pipeline only sees the [`ObjectDetector`] trait. The bundled
//! implementation runs YOLOv8 through ONNX Runtime with automatic execution
//! provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::{imageops::FilterType, RgbImage};
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};
use vscan_models::{BoundingBox, Detection};

use crate::error::{MediaError, MediaResult};

/// Finds objects in a single frame.
///
/// Called from blocking worker threads, so implementations are synchronous.
pub trait ObjectDetector: Send + Sync {
    /// Detections in pixel coordinates of `image`.
    fn detect(&self, image: &RgbImage) -> MediaResult<Vec<Detection>>;
}

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

const NUM_BOXES: usize = 8400;
const NUM_FEATURES: usize = 4 + 80;

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/object_detection/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// Object detector using YOLOv8 ONNX model.
pub struct YoloObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
}

impl YoloObjectDetector {
    /// Create a new object detector from config.
    ///
    /// Returns error if model file doesn't exist or cannot be loaded.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(MediaError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            confidence_threshold = config.confidence_threshold,
            "Object detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }

    /// Resize to the model input, normalize to [0, 1], NCHW layout.
    fn preprocess(&self, img: &RgbImage) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(img, size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for pixel in resized.pixels() {
                chw_data.push(pixel[c] as f32 / 255.0);
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        // YOLOv8 output is [1, 84, 8400]
        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.to_vec())
    }
}

impl ObjectDetector for YoloObjectDetector {
    fn detect(&self, image: &RgbImage) -> MediaResult<Vec<Detection>> {
        let input = self.preprocess(image)?;
        let outputs = self.run_inference(input)?;
        let candidates = decode_yolo_output(
            &outputs,
            self.config.input_size,
            image.width(),
            image.height(),
            self.config.confidence_threshold,
        )?;
        let detections = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }
}

/// Decode raw `[84, 8400]` YOLOv8 output into pixel-space detections.
///
/// Each column holds `cx, cy, w, h` in model input coordinates followed by
/// 80 class scores. Boxes are clamped to the frame.
fn decode_yolo_output(
    outputs: &[f32],
    input_size: u32,
    width: u32,
    height: u32,
    confidence_threshold: f32,
) -> MediaResult<Vec<Detection>> {
    let view = ArrayView2::from_shape((NUM_FEATURES, NUM_BOXES), outputs).map_err(|_| {
        MediaError::detection_failed(format!(
            "Unexpected output size: expected {}, got {}",
            NUM_FEATURES * NUM_BOXES,
            outputs.len()
        ))
    })?;

    let scale_w = width as f32 / input_size as f32;
    let scale_h = height as f32 / input_size as f32;
    let (max_x, max_y) = (width as f32, height as f32);

    let mut candidates = Vec::new();
    for i in 0..NUM_BOXES {
        let (best_class, best_score) = (0..COCO_CLASSES.len())
            .map(|c| (c, view[[4 + c, i]]))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if best_score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]);
        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, max_y);

        candidates.push(Detection::new(
            COCO_CLASSES[best_class],
            best_score,
            BoundingBox::new(x1, y1, x2, y2),
        ));
    }

    Ok(candidates)
}

/// Per-class non-maximum suppression; output is sorted by confidence.
fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        let overlaps = keep.iter().any(|k| {
            k.class_label() == det.class_label() && k.bbox().iou(det.bbox()) > iou_threshold
        });
        if !overlaps {
            keep.push(det);
        }
    }
    keep
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_box(out: &mut [f32], i: usize, cx: f32, cy: f32, w: f32, h: f32, class: usize, score: f32) {
        out[i] = cx;
        out[NUM_BOXES + i] = cy;
        out[2 * NUM_BOXES + i] = w;
        out[3 * NUM_BOXES + i] = h;
        out[(4 + class) * NUM_BOXES + i] = score;
    }

    #[test]
    fn test_coco_classes() {
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES.len(), 80);
    }

    #[test]
    fn test_config_default() {
        let config = ObjectDetectorConfig::default();
        assert_eq!(config.input_size, 640);
        assert!((config.confidence_threshold - 0.25).abs() < 0.001);
        assert!((config.nms_threshold - 0.45).abs() < 0.001);
    }

    #[test]
    fn test_missing_model() {
        let config = ObjectDetectorConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            YoloObjectDetector::new(config),
            Err(MediaError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_decode_scales_to_frame() {
        let mut out = vec![0.0f32; NUM_FEATURES * NUM_BOXES];
        // 1280x640 frame: x scale 2, y scale 1
        set_box(&mut out, 10, 320.0, 320.0, 100.0, 200.0, 2, 0.9);
        set_box(&mut out, 11, 100.0, 100.0, 10.0, 10.0, 0, 0.1);

        let dets = decode_yolo_output(&out, 640, 1280, 640, 0.25).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_label(), "car");
        let b = dets[0].bbox();
        assert!((b.x1() - 540.0).abs() < 1e-3);
        assert!((b.x2() - 740.0).abs() < 1e-3);
        assert!((b.y1() - 220.0).abs() < 1e-3);
        assert!((b.y2() - 420.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(decode_yolo_output(&[0.0; 10], 640, 640, 640, 0.25).is_err());
    }

    #[test]
    fn test_nms_is_per_class() {
        let b = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let shifted = BoundingBox::new(5.0, 5.0, 105.0, 105.0);
        let dets = vec![
            Detection::new("person", 0.6, shifted),
            Detection::new("person", 0.9, b),
            Detection::new("dog", 0.7, b),
        ];

        let kept = non_maximum_suppression(dets, 0.45);
        let labels: Vec<_> = kept.iter().map(|d| d.class_label()).collect();
        assert_eq!(labels, vec!["person", "dog"]);
        assert!((kept[0].confidence() - 0.9).abs() < 1e-6);
    }
}
