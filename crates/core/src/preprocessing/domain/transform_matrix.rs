//! 2×3 affine transform between pixel spaces.
//!
//! The pipeline builds one per frame mapping model-input (tensor) coordinates
//! back to the host frame, so detections can be reported in frame pixels.

use crate::shared::frame::Orientation;
use crate::shared::geometry::{BoundingBox, Point};

/// `x' = m[0]·x + m[1]·y + m[2]`, `y' = m[3]·x + m[4]·y + m[5]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformMatrix {
    m: [f64; 6],
}

impl TransformMatrix {
    pub fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    pub fn from_coefficients(m: [f64; 6]) -> Self {
        Self { m }
    }

    /// Scale then translate: `x' = sx·x + tx`, `y' = sy·y + ty`.
    pub fn scale_translate(sx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            m: [sx, 0.0, tx, 0.0, sy, ty],
        }
    }

    /// Maps upright-image coordinates back into the raw buffer of a frame
    /// that needed `orientation` to become upright.
    ///
    /// `raw_width`/`raw_height` are the dimensions of the buffer as delivered.
    pub fn upright_to_raw(orientation: Orientation, raw_width: f64, raw_height: f64) -> Self {
        let m = match orientation {
            Orientation::Up => [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            Orientation::Right => [0.0, 1.0, 0.0, -1.0, 0.0, raw_height],
            Orientation::Down => [-1.0, 0.0, raw_width, 0.0, -1.0, raw_height],
            Orientation::Left => [0.0, -1.0, raw_width, 1.0, 0.0, 0.0],
        };
        Self { m }
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.m
    }

    pub fn apply(&self, p: Point) -> Point {
        let m = &self.m;
        Point::new(
            m[0] * p.x + m[1] * p.y + m[2],
            m[3] * p.x + m[4] * p.y + m[5],
        )
    }

    /// Maps all four corners and returns their bounding box, which is exact
    /// for the axis-aligned scales and right-angle rotations used here.
    pub fn map_box(&self, b: &BoundingBox) -> BoundingBox {
        let corners = b.corners().map(|p| self.apply(p));
        BoundingBox::enclosing(&corners)
    }

    /// Transform that applies `self` first and `next` second.
    pub fn then(&self, next: &TransformMatrix) -> TransformMatrix {
        let a = &self.m;
        let b = &next.m;
        TransformMatrix {
            m: [
                b[0] * a[0] + b[1] * a[3],
                b[0] * a[1] + b[1] * a[4],
                b[0] * a[2] + b[1] * a[5] + b[2],
                b[3] * a[0] + b[4] * a[3],
                b[3] * a[1] + b[4] * a[4],
                b[3] * a[2] + b[4] * a[5] + b[5],
            ],
        }
    }

    /// `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<TransformMatrix> {
        let [a, b, c, d, e, f] = self.m;
        let det = a * e - b * d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let ia = e / det;
        let ib = -b / det;
        let id = -d / det;
        let ie = a / det;
        Some(TransformMatrix {
            m: [ia, ib, -(ia * c + ib * f), id, ie, -(id * c + ie * f)],
        })
    }
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::identity()
    }
}
