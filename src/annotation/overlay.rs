use std::collections::BTreeMap;
use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::Serialize;

use crate::annotation::ClassColours;
use crate::common::{BvrBox, BvrDetection};

static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

const LABEL_SCALE: f32 = 18.0;
const FPS_SCALE: f32 = 22.0;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const FPS_SHADOW: Rgb<u8> = Rgb([20, 20, 20]);
const FPS_TEXT: Rgb<u8> = Rgb([240, 240, 240]);
const FPS_ORIGIN: (i32, i32) = (10, 25);

/// One box label as it was drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawnLabel {
    pub text: String,
    pub bbox: BvrBox,
    pub colour: [u8; 3],
}

/// What a call to [`Annotator::annotate`] put on the frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameSummary {
    pub labels: Vec<DrawnLabel>,
    pub class_counts: BTreeMap<String, usize>,
}

/// Draws detection boxes, their labels and the FPS readout onto frames.
pub struct Annotator {
    font: FontArc,
    label_scale: PxScale,
    fps_scale: PxScale,
    colours: ClassColours,
}

impl Annotator {
    /// Annotator using the bundled DejaVu Sans Mono.
    pub fn new() -> Result<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)
            .map_err(|e| anyhow::anyhow!("Embedded font is unreadable: {}", e))?;
        Ok(Self::with_font(font))
    }

    pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read font {}: {}", path.display(), e))?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        Ok(Self::with_font(font))
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font,
            label_scale: PxScale::from(LABEL_SCALE),
            fps_scale: PxScale::from(FPS_SCALE),
            colours: ClassColours::new(),
        }
    }

    pub fn colours(&self) -> &ClassColours {
        &self.colours
    }

    /// Draws every detection, then the FPS overlay.
    pub fn annotate(&mut self, img: &mut RgbImage, detections: &[BvrDetection], fps: f64) -> FrameSummary {
        let mut summary = FrameSummary::default();
        for detection in detections {
            let drawn = self.draw_detection(img, detection);
            *summary.class_counts.entry(detection.get_label()).or_insert(0) += 1;
            summary.labels.push(drawn);
        }
        self.draw_fps(img, fps);
        summary
    }

    /// Box outline two pixels thick with a filled caption tab above its top-left corner.
    pub fn draw_detection(&mut self, img: &mut RgbImage, detection: &BvrDetection) -> DrawnLabel {
        let name = detection.get_label();
        let colour = self.colours.get(&name);
        let text = detection.caption();
        let (x1, y1, x2, y2) = detection.bbox.as_x1y1_x2y2_i32();
        let (x1, y1, x2, y2) = (x1 as i64, y1 as i64, x2 as i64, y2 as i64);
        let (width, height) = img.dimensions();

        if let Some(rect) = outline(width, height, x1, y1, x2, y2) {
            draw_hollow_rect_mut(img, rect, colour);
        }
        if x2 - x1 > 2 && y2 - y1 > 2 {
            if let Some(rect) = outline(width, height, x1 + 1, y1 + 1, x2 - 1, y2 - 1) {
                draw_hollow_rect_mut(img, rect, colour);
            }
        }

        let (tw, th) = text_size(self.label_scale, &self.font, &text);
        let (tw, th) = (tw as i64, th as i64);
        let scaled = self.font.as_scaled(self.label_scale);
        let descent = (-scaled.descent()).ceil() as i64;
        let ascent = scaled.ascent().round() as i64;

        let tab_top = y1 - th - descent - 4;
        if let Some(rect) = outline(width, height, x1, tab_top, x1 + tw + 6, y1) {
            draw_filled_rect_mut(img, rect, colour);
        }

        // baseline five pixels above the box
        let (text_x, text_y) = (x1 + 3, y1 - 5 - ascent);
        let text_h = ascent + descent;
        if text_x < width as i64 && text_y < height as i64 && text_x + tw >= 0 && text_y + text_h >= 0 {
            draw_text_mut(img, LABEL_TEXT, text_x as i32, text_y as i32, self.label_scale, &self.font, &text);
        }

        DrawnLabel {
            text,
            bbox: detection.bbox,
            colour: colour.0,
        }
    }

    /// `FPS: <value>` in light text over a dark one pixel halo.
    pub fn draw_fps(&self, img: &mut RgbImage, fps: f64) {
        let text = fps_text(fps);
        let (x, y) = self.fps_text_origin();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    draw_text_mut(img, FPS_SHADOW, x + dx, y + dy, self.fps_scale, &self.font, &text);
                }
            }
        }
        draw_text_mut(img, FPS_TEXT, x, y, self.fps_scale, &self.font, &text);
    }

    /// Area the FPS overlay for `fps` may touch, halo included.
    pub fn fps_region(&self, fps: f64) -> Rect {
        let text = fps_text(fps);
        let (x, y) = self.fps_text_origin();
        let (tw, _) = text_size(self.fps_scale, &self.font, &text);
        let height = self.font.as_scaled(self.fps_scale).height().ceil() as u32;
        let margin = 3;
        Rect::at(x - margin, y - margin).of_size(tw + 2 * margin as u32 + 2, height + 2 * margin as u32 + 2)
    }

    // top-left of the text whose baseline sits at FPS_ORIGIN
    fn fps_text_origin(&self) -> (i32, i32) {
        let ascent = self.font.as_scaled(self.fps_scale).ascent().round() as i32;
        (FPS_ORIGIN.0, FPS_ORIGIN.1 - ascent)
    }
}

pub fn fps_text(fps: f64) -> String {
    format!("FPS: {:.1}", fps)
}

/// Rect for the inclusive corners, limited to a one pixel border around a
/// `width x height` canvas. Inverted or empty spans collapse to one pixel.
/// `None` when nothing of it can land on the canvas.
fn outline(width: u32, height: u32, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Rect> {
    let (w, h) = (width as i64, height as i64);
    let (x2, y2) = (x2.max(x1), y2.max(y1));
    if x2 < -1 || y2 < -1 || x1 > w || y1 > h {
        return None;
    }
    let (left, top) = (x1.max(-1), y1.max(-1));
    let (right, bottom) = (x2.min(w), y2.min(h));
    Some(Rect::at(left as i32, top as i32).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_never_collapses_to_zero() {
        let r = outline(100, 100, 10, 10, 5, 10).unwrap();
        assert_eq!((r.left(), r.top(), r.width(), r.height()), (10, 10, 1, 1));
        let r = outline(100, 100, 10, 10, 50, 50).unwrap();
        assert_eq!((r.right(), r.bottom()), (50, 50));
    }

    #[test]
    fn outline_is_limited_to_the_canvas_border() {
        let r = outline(64, 48, -2_000_000_000, 5, 2_000_000_000, 20).unwrap();
        assert_eq!((r.left(), r.top(), r.right(), r.bottom()), (-1, 5, 64, 20));
        assert!(outline(64, 48, -300, -300, -200, -200).is_none());
        assert!(outline(64, 48, 70, 0, 90, 10).is_none());
    }

    #[test]
    fn fps_text_has_one_decimal() {
        assert_eq!(fps_text(29.97), "FPS: 30.0");
        assert_eq!(fps_text(0.0), "FPS: 0.0");
    }

    #[test]
    fn degenerate_and_offscreen_boxes_do_not_panic() {
        let mut annotator = Annotator::new().unwrap();
        let mut img = RgbImage::new(64, 48);
        let detections = [
            BvrDetection::default().with_x1y1_x2y2(30., 30., 30., 30.).with_label("dot"),
            BvrDetection::default().with_x1y1_x2y2(40., 40., 20., 20.).with_label("inverted"),
            BvrDetection::default().with_x1y1_x2y2(-100., -100., 500., 500.).with_label("huge"),
        ];
        let summary = annotator.annotate(&mut img, &detections, 12.0);
        assert_eq!(summary.labels.len(), 3);
        assert_eq!(img.get_pixel(30, 30), &annotator.colours.get("dot"));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let mut annotator = Annotator::new().unwrap();
        let mut img = RgbImage::new(64, 48);
        let detections = [
            BvrDetection::default().with_x1y1_x2y2(-2e9, 5., 2e9, 20.).with_label("wide"),
            BvrDetection::default().with_x1y1_x2y2(-3e9, -3e9, 10., 10.).with_label("corner"),
            BvrDetection::default().with_x1y1_x2y2(f32::MIN, f32::MIN, f32::MAX, f32::MAX).with_label("all"),
        ];
        let summary = annotator.annotate(&mut img, &detections, 5.0);
        assert_eq!(summary.labels.len(), 3);

        // the wide box's top edge runs along row 5 across the frame
        let wide = annotator.colours.get("wide");
        assert_eq!(img.get_pixel(40, 5), &wide);
        assert_eq!(img.get_pixel(0, 5), &wide);
    }

    #[test]
    fn counts_detections_per_class() {
        let mut annotator = Annotator::new().unwrap();
        let mut img = RgbImage::new(320, 240);
        let detections = [
            BvrDetection::default().with_x1y1_x2y2(10., 40., 50., 80.).with_label("person").with_confidence(0.9),
            BvrDetection::default().with_x1y1_x2y2(100., 40., 150., 80.).with_label("person").with_confidence(0.7),
            BvrDetection::default().with_x1y1_x2y2(200., 40., 250., 80.).with_class_id(3).with_confidence(0.6),
        ];
        let summary = annotator.annotate(&mut img, &detections, 0.0);
        assert_eq!(summary.class_counts.get("person"), Some(&2));
        assert_eq!(summary.class_counts.get("id_3"), Some(&1));
        assert_eq!(summary.labels[2].text, "id_3 0.60");
        assert_eq!(annotator.colours().len(), 2);
    }
}
