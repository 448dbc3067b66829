use std::collections::VecDeque;

use crate::detection::domain::detection_candidate::DetectionCandidate;

pub const DEFAULT_FOCUS_THRESHOLD: f64 = 0.85;
pub const DEFAULT_STABILITY_FRAMES: usize = 3;

/// Faces smaller than this (px²) are likely far away and score lower.
const SMALL_FACE_AREA: f64 = 10_000.0;
const SMALL_FACE_PENALTY: f64 = 0.7;
const LANDMARK_BONUS: f64 = 1.2;

/// Maximum per-axis movement (px) between frames still considered stable.
const MAX_STABLE_MOVEMENT: f64 = 20.0;

/// Decides when a run of detection results is good enough to take a photo.
///
/// Fires once the last `stability_frames` frames all score at least
/// `focus_threshold`, then starts over.
pub struct AutoCaptureDetector {
    focus_threshold: f64,
    stability_frames: usize,
    history: VecDeque<f64>,
}

impl AutoCaptureDetector {
    pub fn new(focus_threshold: f64, stability_frames: usize) -> Self {
        let stability_frames = stability_frames.max(1);
        Self {
            focus_threshold,
            stability_frames,
            history: VecDeque::with_capacity(stability_frames),
        }
    }

    /// Feed one frame's faces. Returns `true` when a capture should trigger.
    pub fn check_focus(&mut self, faces: &[DetectionCandidate]) -> bool {
        if faces.is_empty() {
            self.history.clear();
            return false;
        }

        self.history.push_back(focus_score(faces));
        if self.history.len() > self.stability_frames {
            self.history.pop_front();
        }

        let ready = self.history.len() >= self.stability_frames
            && self.history.iter().all(|&s| s >= self.focus_threshold);
        if ready {
            log::debug!("Auto-capture triggered after {} steady frames", self.stability_frames);
            self.history.clear();
        }
        ready
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for AutoCaptureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_THRESHOLD, DEFAULT_STABILITY_FRAMES)
    }
}

/// Score in `[0, 1]` for the most confident face in the frame.
pub fn focus_score(faces: &[DetectionCandidate]) -> f64 {
    let Some(best) = faces
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        return 0.0;
    };

    let mut score = best.confidence;
    if best.area() < SMALL_FACE_AREA {
        score *= SMALL_FACE_PENALTY;
    }
    if best.has_landmarks() {
        score = (score * LANDMARK_BONUS).min(1.0);
    }
    score
}

/// Whether faces barely moved between two consecutive frames.
///
/// Faces are compared pairwise in order; counts must match.
pub fn is_stable(previous: &[DetectionCandidate], current: &[DetectionCandidate]) -> bool {
    previous.len() == current.len()
        && previous.iter().zip(current).all(|(p, c)| {
            (c.x - p.x).abs() <= MAX_STABLE_MOVEMENT && (c.y - p.y).abs() <= MAX_STABLE_MOVEMENT
        })
}
