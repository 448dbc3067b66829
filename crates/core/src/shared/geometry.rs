use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in corner form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    /// Smallest box containing all `points`.
    pub fn enclosing(points: &[Point]) -> Self {
        let mut bb = Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            bb.x1 = bb.x1.min(p.x);
            bb.y1 = bb.y1.min(p.y);
            bb.x2 = bb.x2.max(p.x);
            bb.y2 = bb.y2.max(p.y);
        }
        bb
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x1, self.y1),
            Point::new(self.x2, self.y1),
            Point::new(self.x2, self.y2),
            Point::new(self.x1, self.y2),
        ]
    }

    /// Intersection-over-union; 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clip to `[0, width] × [0, height]`. Returns `None` when nothing is left.
    pub fn clamp_to(&self, width: f64, height: f64) -> Option<BoundingBox> {
        let clamped = BoundingBox {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        };
        if clamped.area() > 0.0 {
            Some(clamped)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_no_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_perfect_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0);
    }

    #[test]
    fn test_iou_degenerate_box_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_from_center() {
        let b = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b, BoundingBox::new(40.0, 35.0, 60.0, 45.0));
    }

    #[test]
    fn test_enclosing_points() {
        let b = BoundingBox::enclosing(&[
            Point::new(5.0, 9.0),
            Point::new(1.0, 3.0),
            Point::new(7.0, 4.0),
        ]);
        assert_eq!(b, BoundingBox::new(1.0, 3.0, 7.0, 9.0));
    }

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let b = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(b.clamp_to(100.0, 100.0), Some(b));
    }

    #[test]
    fn test_clamp_crops_edges() {
        let b = BoundingBox::new(-10.0, 90.0, 20.0, 120.0);
        assert_eq!(
            b.clamp_to(100.0, 100.0),
            Some(BoundingBox::new(0.0, 90.0, 20.0, 100.0))
        );
    }

    #[test]
    fn test_clamp_outside_is_none() {
        let b = BoundingBox::new(120.0, 10.0, 140.0, 20.0);
        assert_eq!(b.clamp_to(100.0, 100.0), None);
    }
}
