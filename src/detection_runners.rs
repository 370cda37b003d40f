pub mod inference_process;
pub mod ort_detector;

pub use ort_detector::*;

use crate::common::{BvrDetection, BvrImage};

/// Anything that can turn a single frame into detections in frame pixels.
pub trait FrameDetector {
    fn detect(&mut self, frame: &BvrImage, conf_threshold: f32, image_size: u32) -> anyhow::Result<Vec<BvrDetection>>;
}
