use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates of the frame it was detected on.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BvrBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub w: f32,
    pub h: f32,
}

impl BvrBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            w: x2 - x1,
            h: y2 - y1,
        }
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.w
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.) * self.h.max(0.)
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &BvrBox) -> f32 {
        let left = self.x1.max(other.x1);
        let right = self.x2.min(other.x2);
        let top = self.y1.max(other.y1);
        let bottom = self.y2.min(other.y2);
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &BvrBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Intersection over union. Two empty boxes have an IoU of 0.
    pub fn iou(&self, other: &BvrBox) -> f32 {
        let union = self.union(other);
        if union <= 0. {
            return 0.;
        }
        self.intersect(other) / union
    }

    /// Integer corners, truncated toward zero.
    pub fn as_x1y1_x2y2_i32(&self) -> (i32, i32, i32, i32) {
        (self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32)
    }

    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)` and calculates width and height.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;

        self.w = x2 - x1;
        self.h = y2 - y1;
        self
    }

    /// Sets the bounding box's coordinates and dimensions using `(cx, cy, w, h)`.
    pub fn with_cxcy_wh(self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.with_x1y1_x2y2(cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2.)
    }

    /// Divides every coordinate by `ratio`, mapping a box from letterboxed model
    /// space back onto the source frame.
    pub fn unscale(self, ratio: f32) -> Self {
        self.with_x1y1_x2y2(self.x1 / ratio, self.y1 / ratio, self.x2 / ratio, self.y2 / ratio)
    }

    /// Clips the box to `[0, width] x [0, height]`.
    pub fn clip(self, width: f32, height: f32) -> Self {
        self.with_x1y1_x2y2(
            self.x1.clamp(0., width),
            self.y1.clamp(0., height),
            self.x2.clamp(0., width),
            self.y2.clamp(0., height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BvrBox::new(10., 10., 50., 50.);
        assert!((a.iou(&a) - 1.).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BvrBox::new(0., 0., 10., 10.);
        let b = BvrBox::new(20., 20., 30., 30.);
        assert_eq!(a.iou(&b), 0.);
    }

    #[test]
    fn degenerate_boxes_do_not_divide_by_zero() {
        let a = BvrBox::new(5., 5., 5., 5.);
        assert_eq!(a.iou(&a), 0.);
    }

    #[test]
    fn cxcy_wh_builds_corners() {
        let b = BvrBox::default().with_cxcy_wh(30., 30., 40., 20.);
        assert_eq!(b.as_x1y1_x2y2_i32(), (10, 20, 50, 40));
        assert_eq!(b.width(), 40.);
        assert_eq!(b.height(), 20.);
    }

    #[test]
    fn integer_corners_truncate_toward_zero() {
        let b = BvrBox::new(10.9, -0.7, 49.99, 50.5);
        assert_eq!(b.as_x1y1_x2y2_i32(), (10, 0, 49, 50));
    }

    #[test]
    fn clip_keeps_box_inside_frame() {
        let b = BvrBox::new(-5., 10., 700., 500.).clip(640., 480.);
        assert_eq!(b.as_x1y1_x2y2_i32(), (0, 10, 640, 480));
    }
}
