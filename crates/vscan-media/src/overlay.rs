//! Detection overlays and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use vscan_models::Detection;

use crate::error::{MediaError, MediaResult};

/// Renders detections on top of a frame.
pub trait OverlayRenderer: Send + Sync {
    fn render(&self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<RgbImage>;
}

/// Draws a hollow box and a centre dot per detection, coloured by class.
#[derive(Debug, Clone)]
pub struct BoxOverlayRenderer {
    /// Box border width in pixels
    pub line_thickness: u32,
    /// Radius of the centre marker
    pub marker_radius: i32,
}

impl Default for BoxOverlayRenderer {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            marker_radius: 3,
        }
    }
}

impl OverlayRenderer for BoxOverlayRenderer {
    fn render(&self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<RgbImage> {
        let mut img = frame.clone();
        let (frame_w, frame_h) = img.dimensions();

        for det in detections {
            let color = class_color(det.class_label());
            let bbox = det.bbox();

            let x = (bbox.x1().max(0.0) as u32).min(frame_w);
            let y = (bbox.y1().max(0.0) as u32).min(frame_h);
            let w = (bbox.width() as u32).min(frame_w.saturating_sub(x));
            let h = (bbox.height() as u32).min(frame_h.saturating_sub(y));

            for t in 0..self.line_thickness {
                let inner_w = w.saturating_sub(2 * t);
                let inner_h = h.saturating_sub(2 * t);
                if inner_w > 0 && inner_h > 0 {
                    let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(inner_w, inner_h);
                    draw_hollow_rect_mut(&mut img, rect, color);
                }
            }

            let (cx, cy) = det.center();
            draw_filled_circle_mut(&mut img, (cx as i32, cy as i32), self.marker_radius, color);
        }

        Ok(img)
    }
}

/// Stable per-class colour: people green, vehicles orange, everything else
/// from a small palette keyed on the label.
fn class_color(label: &str) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 6] = [
        [66, 135, 245],
        [245, 66, 230],
        [66, 245, 221],
        [245, 221, 66],
        [155, 66, 245],
        [245, 66, 66],
    ];

    match label {
        "person" => Rgb([0, 200, 0]),
        "car" | "truck" | "bus" | "motorcycle" | "bicycle" => Rgb([255, 140, 0]),
        other => {
            let hash = other.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            Rgb(PALETTE[hash % PALETTE.len()])
        }
    }
}

/// Encode a frame as JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)
        .map_err(|e| MediaError::render_failed(format!("JPEG encoding failed: {}", e)))?;
    Ok(buf)
}
