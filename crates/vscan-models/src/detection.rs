//! Object detections reported for a single frame.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-frame pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`. Construction always orders the corners
/// so that `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Build from a top-left corner and a size.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = inter_w * inter_h;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One object instance reported by the detector.
///
/// Immutable once built; the centre is always derived from the box and is
/// only written out for clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DetectionRecord", into = "DetectionRecord")]
pub struct Detection {
    class_label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    /// Create a detection. Confidence is clamped to `[0, 1]`.
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn center(&self) -> (f32, f32) {
        self.bbox.center()
    }

    pub fn is_person(&self) -> bool {
        self.class_label == "person"
    }
}

#[derive(Serialize, Deserialize)]
struct DetectionRecord {
    #[serde(rename = "class")]
    class_label: String,
    confidence: f32,
    bbox: BoundingBox,
    #[serde(default)]
    center: [f32; 2],
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Detection::new(r.class_label, r.confidence, r.bbox)
    }
}

impl From<Detection> for DetectionRecord {
    fn from(d: Detection) -> Self {
        let (cx, cy) = d.center();
        Self {
            class_label: d.class_label,
            confidence: d.confidence,
            bbox: d.bbox,
            center: [cx, cy],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_orders_corners() {
        let b = BoundingBox::new(50.0, 80.0, 10.0, 20.0);
        assert_eq!(b.x1(), 10.0);
        assert_eq!(b.y1(), 20.0);
        assert_eq!(b.x2(), 50.0);
        assert_eq!(b.y2(), 80.0);
        assert_eq!(b.width(), 40.0);
        assert_eq!(b.height(), 60.0);
    }

    #[test]
    fn test_center_is_derived() {
        let det = Detection::new("car", 0.8, BoundingBox::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(det.center(), (50.0, 25.0));
    }

    #[test]
    fn test_confidence_clamped() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Detection::new("dog", 1.7, b).confidence(), 1.0);
        assert_eq!(Detection::new("dog", -0.2, b).confidence(), 0.0);
        assert_eq!(Detection::new("dog", f32::NAN, b).confidence(), 0.0);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::from_xywh(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let b = BoundingBox::from_xywh(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);

        let far = BoundingBox::from_xywh(100.0, 100.0, 1.0, 1.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_wire_format() {
        let det = Detection::new("person", 0.5, BoundingBox::new(2.0, 4.0, 6.0, 8.0));
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["class"], "person");
        assert_eq!(json["bbox"], serde_json::json!([2.0, 4.0, 6.0, 8.0]));
        assert_eq!(json["center"], serde_json::json!([4.0, 6.0]));
    }

    #[test]
    fn test_stored_center_is_ignored() {
        let json = r#"{"class":"bus","confidence":0.9,"bbox":[0,0,10,10],"center":[99,99]}"#;
        let det: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(det.center(), (5.0, 5.0));
        assert_eq!(det.class_label(), "bus");
    }
}
