//! Axis-aligned bounding box geometry for page regions.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in page pixel coordinates.
///
/// `(x0, y0)` is the top-left corner and `(x1, y1)` the bottom-right corner.
/// Boxes built through [`BoundingBox::from_coords`] always have their corners
/// in that order; a box with zero width or height is *degenerate*.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x0: f32,
    /// Top edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Bottom edge.
    pub y1: f32,
}

impl BoundingBox {
    /// Creates a bounding box from two corners, in any order.
    ///
    /// # Arguments
    ///
    /// * `x0` - The x-coordinate of one corner.
    /// * `y0` - The y-coordinate of one corner.
    /// * `x1` - The x-coordinate of the opposite corner.
    /// * `y1` - The y-coordinate of the opposite corner.
    ///
    /// # Returns
    ///
    /// A new `BoundingBox` with `x0 <= x1` and `y0 <= y1`.
    pub fn from_coords(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Creates a bounding box from its center and size, as emitted by YOLO-style detectors.
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::from_coords(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Returns `true` if the box has no area or non-finite coordinates.
    pub fn is_degenerate(&self) -> bool {
        let finite =
            self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite();
        !finite || self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Calculates the intersection area between this bounding box and another.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let inter_x_min = self.x0.max(other.x0);
        let inter_y_min = self.y0.max(other.y0);
        let inter_x_max = self.x1.min(other.x1);
        let inter_y_max = self.y1.min(other.y1);

        if inter_x_min >= inter_x_max || inter_y_min >= inter_y_max {
            return 0.0;
        }
        (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min)
    }

    /// Computes the Intersection over Union (IoU) between this bounding box and another.
    ///
    /// # Returns
    ///
    /// The IoU value between 0.0 and 1.0. Degenerate boxes have an IoU of 0.0
    /// with everything.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        if inter_area <= 0.0 {
            return 0.0;
        }
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0.0 {
            return 0.0;
        }
        inter_area / union_area
    }

    /// Computes the union (minimum enclosing box) of this bounding box and another.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Checks if this bounding box lies entirely within `container`.
    ///
    /// # Arguments
    ///
    /// * `container` - The bounding box to check if this box is inside.
    /// * `tolerance` - Tolerance in pixels for boundary checks.
    pub fn is_fully_inside(&self, container: &BoundingBox, tolerance: f32) -> bool {
        self.x0 + tolerance >= container.x0
            && self.y0 + tolerance >= container.y0
            && self.x1 - tolerance <= container.x1
            && self.y1 - tolerance <= container.y1
    }

    /// Returns `true` if either box fully contains the other.
    pub fn contains_or_within(&self, other: &BoundingBox) -> bool {
        self.is_fully_inside(other, 0.0) || other.is_fully_inside(self, 0.0)
    }

    /// Returns a new bounding box translated by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// Returns a new bounding box scaled independently along each axis.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self::from_coords(self.x0 * sx, self.y0 * sy, self.x1 * sx, self.y1 * sy)
    }

    /// Clamps the box to `[0, width] x [0, height]`.
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x0: self.x0.clamp(0.0, width),
            y0: self.y0.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
        }
    }

    /// Grows the box by `padding` pixels on every side.
    pub fn pad(&self, padding: f32) -> Self {
        Self {
            x0: self.x0 - padding,
            y0: self.y0 - padding,
            x1: self.x1 + padding,
            y1: self.y1 + padding,
        }
    }
}
