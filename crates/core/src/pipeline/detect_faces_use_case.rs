use std::time::Instant;

use crate::detection::domain::decoder::{decode, DecodeParams};
use crate::detection::domain::detection_candidate::DetectionResult;
use crate::detection::domain::inference_engine::ModelHandle;
use crate::pipeline::pipeline_logger::{
    PipelineLogger, METRIC_FACES, STAGE_ADAPT, STAGE_DECODE, STAGE_INFERENCE, STAGE_PREPROCESS,
};
use crate::preprocessing::domain::frame_adapter::adapt;
use crate::preprocessing::domain::letterbox::{prepare, ResizePolicy};
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::shared::error::DetectionError;
use crate::shared::frame::RawFrame;

/// Per-call knobs for one detection pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionSettings {
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
    pub max_faces: Option<usize>,
    pub resize_policy: ResizePolicy,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_faces: None,
            resize_policy: ResizePolicy::Letterbox,
        }
    }
}

/// Single-frame detection pipeline: adapt → prepare → infer → decode.
///
/// Stateless; the model handle carries the only shared state.
pub struct DetectFacesUseCase {
    model: ModelHandle,
}

impl DetectFacesUseCase {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    /// Detects faces in `frame`. `detection_time_ms` covers all four stages.
    pub fn execute(
        &self,
        frame: &RawFrame<'_>,
        settings: &DetectionSettings,
        logger: &mut dyn PipelineLogger,
    ) -> Result<DetectionResult, DetectionError> {
        let started = Instant::now();

        let t = Instant::now();
        let image = adapt(frame)?;
        logger.timing(STAGE_ADAPT, elapsed_ms(t));

        let t = Instant::now();
        let (tensor, to_frame) =
            prepare(&image, &self.model.input_spec(), settings.resize_policy)?;
        logger.timing(STAGE_PREPROCESS, elapsed_ms(t));

        let t = Instant::now();
        let raw = self.model.infer(&tensor)?;
        logger.timing(STAGE_INFERENCE, elapsed_ms(t));

        let t = Instant::now();
        let params = DecodeParams {
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            max_faces: settings.max_faces,
            frame_width: frame.width(),
            frame_height: frame.height(),
        };
        let faces = decode(&raw, &to_frame, &params);
        logger.timing(STAGE_DECODE, elapsed_ms(t));
        logger.metric(METRIC_FACES, faces.len() as f64);

        let detection_time_ms = elapsed_ms(started);
        log::debug!(
            "Frame {}x{} @{}ns: {} raw, {} faces in {detection_time_ms:.2}ms",
            frame.width(),
            frame.height(),
            frame.timestamp_ns(),
            raw.len(),
            faces.len()
        );

        Ok(DetectionResult {
            faces,
            width: frame.width(),
            height: frame.height(),
            detection_time_ms,
        })
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
