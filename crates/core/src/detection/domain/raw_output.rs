use crate::shared::geometry::{BoundingBox, Point};

/// One undecoded detection, in model-input (tensor pixel) coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCandidate {
    pub bbox: BoundingBox,
    /// Probability in [0, 1].
    pub score: f64,
    pub landmarks: Vec<Point>,
}

/// Everything a backend produced for one tensor, in backend order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutput {
    pub candidates: Vec<RawCandidate>,
}

impl RawOutput {
    pub fn new(candidates: Vec<RawCandidate>) -> Self {
        Self { candidates }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}
