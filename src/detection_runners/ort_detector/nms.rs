use crate::common::BvrDetection;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class(&self) -> usize;
}

impl Nms for BvrDetection {
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn class(&self) -> usize {
        self.class_id
    }
}

/// Greedy non-maximum suppression. Leaves `boxes` sorted by descending
/// confidence. A box is only suppressed by a kept box of the same class unless
/// `agnostic` is set.
pub fn nms<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32, agnostic: bool) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if !agnostic && boxes[prev_index].class() != boxes[index].class() {
                continue;
            }
            if boxes[prev_index].iou(&boxes[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}
