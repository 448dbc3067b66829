//! Turns raw backend candidates into faces in host frame pixels.
//!
//! Threshold, greedy NMS, mapping through the preprocessing transform and
//! clamping to the frame, then top-N truncation.

use super::detection_candidate::DetectionCandidate;
use super::raw_output::{RawCandidate, RawOutput};
use crate::preprocessing::domain::transform_matrix::TransformMatrix;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::shared::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeParams {
    pub confidence_threshold: f64,
    /// Boxes overlapping a kept box by more than this are suppressed.
    pub iou_threshold: f64,
    /// Keep at most this many faces, highest confidence first.
    pub max_faces: Option<usize>,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl DecodeParams {
    pub fn for_frame(frame_width: u32, frame_height: u32) -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_faces: None,
            frame_width,
            frame_height,
        }
    }
}

/// Decode `raw` into faces ordered by descending confidence.
///
/// Equal confidences keep backend order, so the output is deterministic.
pub fn decode(
    raw: &RawOutput,
    to_frame: &TransformMatrix,
    params: &DecodeParams,
) -> Vec<DetectionCandidate> {
    let passing: Vec<&RawCandidate> = raw
        .candidates
        .iter()
        .filter(|c| c.score >= params.confidence_threshold)
        .collect();

    let kept = nms(passing, params.iou_threshold);

    // Boxes that fall outside the frame are dropped before the top-N cut so
    // they never take a `max_faces` slot.
    let fw = params.frame_width as f64;
    let fh = params.frame_height as f64;
    kept.into_iter()
        .filter_map(|c| {
            let bbox = to_frame.map_box(&c.bbox).clamp_to(fw, fh)?;
            let landmarks = c
                .landmarks
                .iter()
                .map(|p| {
                    let q = to_frame.apply(*p);
                    Point::new(q.x.clamp(0.0, fw), q.y.clamp(0.0, fh))
                })
                .collect();
            Some(DetectionCandidate {
                x: bbox.x1,
                y: bbox.y1,
                width: bbox.width(),
                height: bbox.height(),
                confidence: c.score,
                landmarks,
            })
        })
        .take(params.max_faces.unwrap_or(usize::MAX))
        .collect()
}

/// Greedy NMS: stable sort by confidence descending, suppress overlapping boxes.
fn nms(mut dets: Vec<&RawCandidate>, iou_thresh: f64) -> Vec<&RawCandidate> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i]);
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}
