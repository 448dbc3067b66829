use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::frame_processor_plugin::Options;
use crate::detection::domain::inference_backend::ModelSource;
use crate::preprocessing::domain::letterbox::ResizePolicy;
use crate::shared::constants::{
    BLAZEFACE_MODEL_NAME, BLAZEFACE_MODEL_URL, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_IOU_THRESHOLD, DEFAULT_LOAD_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_FRAMES,
};
use crate::shared::error::DetectionError;

/// Construction options for [`FaceDetectionPlugin`](super::face_detection_plugin::FaceDetectionPlugin).
///
/// Every field is optional in the host map; missing keys take the defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Explicit model file. Takes precedence over `model_name`.
    pub model_path: Option<PathBuf>,
    pub model_name: String,
    pub model_url: String,
    /// Directory searched for `model_name` before downloading.
    pub bundled_dir: Option<PathBuf>,
    pub iou_threshold: f64,
    pub default_confidence_threshold: f64,
    pub resize_policy: ResizePolicy,
    /// Frames arriving faster than this are skipped. `None` disables throttling.
    pub max_frames_per_second: Option<f64>,
    pub max_concurrent_frames: usize,
    pub load_timeout_ms: u64,
    /// Load the model at construction instead of on the first frame.
    pub eager_load: bool,
    /// Aggregate per-stage timings for [`summary`](super::frame_processor_plugin::FrameProcessorPlugin::summary).
    pub collect_timings: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_name: BLAZEFACE_MODEL_NAME.to_string(),
            model_url: BLAZEFACE_MODEL_URL.to_string(),
            bundled_dir: None,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            default_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            resize_policy: ResizePolicy::default(),
            max_frames_per_second: None,
            max_concurrent_frames: DEFAULT_MAX_CONCURRENT_FRAMES,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            eager_load: false,
            collect_timings: false,
        }
    }
}

impl PluginConfig {
    /// Build from the host's construction map. `None` yields the defaults.
    pub fn from_options(options: Option<&Options>) -> Result<Self, DetectionError> {
        let config = match options {
            Some(map) => serde_json::from_value(Value::Object(map.clone()))
                .map_err(|e| DetectionError::Config(e.to_string()))?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        for (name, value) in [
            ("iouThreshold", self.iou_threshold),
            ("defaultConfidenceThreshold", self.default_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectionError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if let Some(fps) = self.max_frames_per_second {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(DetectionError::Config(format!(
                    "maxFramesPerSecond must be positive, got {fps}"
                )));
            }
        }
        if self.max_concurrent_frames == 0 {
            return Err(DetectionError::Config(
                "maxConcurrentFrames must be at least 1".into(),
            ));
        }
        if self.load_timeout_ms == 0 {
            return Err(DetectionError::Config(
                "loadTimeoutMs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn model_source(&self) -> ModelSource {
        match &self.model_path {
            Some(path) => ModelSource::File(path.clone()),
            None => ModelSource::Named {
                name: self.model_name.clone(),
                url: self.model_url.clone(),
                bundled_dir: self.bundled_dir.clone(),
            },
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}
