use serde::{Deserialize, Serialize};
use crate::common::BvrBox;

/// One model output for one frame.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BvrDetection {
    pub class_id: usize,
    pub bbox: BvrBox,
    pub label: Option<String>,
    pub confidence: f32,
}

impl BvrDetection {
    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)`.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BvrBox::default().with_x1y1_x2y2(x1, y1, x2, y2);
        self
    }

    pub fn with_bbox(mut self, bbox: BvrBox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_confidence(mut self, conf: f32) -> Self {
        self.confidence = conf;
        self
    }

    pub fn with_class_id(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Class name, or `id_<class_id>` when the model did not name the class.
    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| format!("id_{}", self.class_id))
    }

    /// Text drawn above the box, e.g. `person 0.83`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.get_label(), self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_uses_two_decimals() {
        let det = BvrDetection::default()
            .with_x1y1_x2y2(10., 10., 50., 50.)
            .with_label("person")
            .with_confidence(0.8271);
        assert_eq!(det.caption(), "person 0.83");
    }

    #[test]
    fn unnamed_class_falls_back_to_id() {
        let det = BvrDetection::default().with_class_id(17).with_confidence(0.5);
        assert_eq!(det.get_label(), "id_17");
    }
}
