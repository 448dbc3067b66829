use serde::Serialize;

use crate::shared::geometry::Point;

/// A decoded face in host frame pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionCandidate {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub landmarks: Vec<Point>,
}

impl DetectionCandidate {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn has_landmarks(&self) -> bool {
        !self.landmarks.is_empty()
    }
}

/// The per-call outcome handed to the plugin boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub faces: Vec<DetectionCandidate>,
    pub width: u32,
    pub height: u32,
    pub detection_time_ms: f64,
}

impl DetectionResult {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            faces: Vec::new(),
            width,
            height,
            detection_time_ms: 0.0,
        }
    }
}
