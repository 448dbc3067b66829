use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::detect_options::DetectOptions;
use super::frame_processor_plugin::{FrameProcessorPlugin, Options};
use super::frame_throttle::{FrameThrottle, InFlightLimit};
use super::plugin_config::PluginConfig;
use crate::detection::domain::detection_candidate::{DetectionCandidate, DetectionResult};
use crate::detection::domain::inference_backend::{ModelLoader, ModelSource};
use crate::detection::domain::inference_engine::InferenceEngine;
use crate::detection::infrastructure::onnx_model_loader::OnnxModelLoader;
use crate::pipeline::detect_faces_use_case::{DetectFacesUseCase, DetectionSettings};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger, StdoutPipelineLogger};
use crate::shared::error::DetectionError;
use crate::shared::frame::RawFrame;

/// The `detectFaces` frame processor.
///
/// Safe to call from several camera threads at once. Inference itself is
/// serialized by the model handle; everything before and after runs in
/// parallel up to `maxConcurrentFrames`.
pub struct FaceDetectionPlugin {
    config: PluginConfig,
    source: ModelSource,
    engine: InferenceEngine,
    throttle: FrameThrottle,
    in_flight: InFlightLimit,
    /// Only present when timings are collected; the lock serializes frames.
    logger: Option<Mutex<StdoutPipelineLogger>>,
}

impl FaceDetectionPlugin {
    pub fn new(config: PluginConfig) -> Self {
        let loader = Arc::new(OnnxModelLoader::new(config.load_timeout()));
        Self::with_loader(config, loader)
    }

    /// Build from the host's construction map.
    pub fn from_options(options: Option<&Options>) -> Result<Self, DetectionError> {
        Ok(Self::new(PluginConfig::from_options(options)?))
    }

    pub fn with_loader(config: PluginConfig, loader: Arc<dyn ModelLoader>) -> Self {
        let logger = config
            .collect_timings
            .then(|| Mutex::new(StdoutPipelineLogger::new()));
        let plugin = Self {
            source: config.model_source(),
            engine: InferenceEngine::new(loader, config.load_timeout()),
            throttle: FrameThrottle::new(config.max_frames_per_second),
            in_flight: InFlightLimit::new(config.max_concurrent_frames),
            logger,
            config,
        };
        if plugin.config.eager_load {
            // A failure is remembered by the engine and reported on the first frame.
            if let Err(e) = plugin.engine.load_model(&plugin.source) {
                log::warn!("Eager model load failed: {e}");
            }
        }
        plugin
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Run the full pipeline on one frame, bypassing throttle and busy checks.
    pub fn detect(
        &self,
        frame: &RawFrame<'_>,
        arguments: Option<&Options>,
    ) -> Result<(DetectionResult, DetectOptions), DetectionError> {
        let options = DetectOptions::parse(arguments, self.config.default_confidence_threshold)?;
        let model = self.engine.load_model(&self.source)?;
        let settings = DetectionSettings {
            confidence_threshold: options.confidence_threshold,
            iou_threshold: self.config.iou_threshold,
            max_faces: options.max_faces,
            resize_policy: self.config.resize_policy,
        };
        let use_case = DetectFacesUseCase::new(model);

        let result = match &self.logger {
            Some(logger) => {
                let mut logger = logger
                    .lock()
                    .map_err(|_| DetectionError::Inference("pipeline logger poisoned".into()))?;
                use_case.execute(frame, &settings, &mut *logger)?
            }
            None => use_case.execute(frame, &settings, &mut NullPipelineLogger)?,
        };
        Ok((result, options))
    }

    /// Forget the loaded model or a remembered load failure.
    pub fn reset(&self) {
        self.engine.reset();
    }
}

impl FrameProcessorPlugin for FaceDetectionPlugin {
    fn callback(&self, frame: &RawFrame<'_>, arguments: Option<&Options>) -> Option<Value> {
        // A busy frame must not consume the throttle interval.
        let Some(_slot) = self.in_flight.try_enter() else {
            let err = DetectionError::Busy(format!(
                "{} frames already in flight",
                self.in_flight.in_flight()
            ));
            log::warn!("{err}");
            return Some(error_map(frame, &err));
        };

        if !self.throttle.admit() {
            log::trace!("Frame @{}ns skipped by throttle", frame.timestamp_ns());
            return None;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.detect(frame, arguments)))
            .unwrap_or_else(|payload| {
                Err(DetectionError::Inference(format!(
                    "pipeline panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        Some(match outcome {
            Ok((result, options)) => result_map(&result, options.return_landmarks),
            Err(err) => {
                log::error!("detectFaces failed: {err}");
                error_map(frame, &err)
            }
        })
    }

    fn summary(&self) {
        if let Some(logger) = &self.logger {
            if let Ok(logger) = logger.lock() {
                logger.summary();
            }
        }
    }
}

fn result_map(result: &DetectionResult, with_landmarks: bool) -> Value {
    let faces: Vec<Value> = result
        .faces
        .iter()
        .map(|face| face_map(face, with_landmarks))
        .collect();
    json!({
        "faces": faces,
        "width": result.width,
        "height": result.height,
        "detectionTime": result.detection_time_ms,
    })
}

fn face_map(face: &DetectionCandidate, with_landmarks: bool) -> Value {
    let mut map = json!({
        "x": face.x,
        "y": face.y,
        "width": face.width,
        "height": face.height,
        "confidence": face.confidence,
    });
    if with_landmarks {
        let landmarks: Vec<Value> = face
            .landmarks
            .iter()
            .map(|p| json!({ "x": p.x, "y": p.y }))
            .collect();
        map["landmarks"] = Value::Array(landmarks);
    }
    map
}

fn error_map(frame: &RawFrame<'_>, err: &DetectionError) -> Value {
    json!({
        "faces": [],
        "width": frame.width(),
        "height": frame.height(),
        "detectionTime": 0,
        "error": {
            "code": err.code(),
            "message": err.message(),
        },
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::inference_backend::InferenceBackend;
    use crate::detection::domain::inference_engine::tests::{CountingLoader, FixedBackend};
    use crate::detection::domain::raw_output::{RawCandidate, RawOutput};
    use crate::preprocessing::domain::letterbox::{InputSpec, Tensor};
    use crate::shared::frame::PixelFormat;
    use crate::pipeline::pipeline_logger::{
        METRIC_FACES, STAGE_ADAPT, STAGE_DECODE, STAGE_INFERENCE, STAGE_PREPROCESS,
    };
    use crate::shared::geometry::{BoundingBox, Point};
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Hands out a backend that always returns `output`.
    struct FixedLoader {
        output: RawOutput,
    }

    impl ModelLoader for FixedLoader {
        fn load(&self, _source: &ModelSource) -> Result<Box<dyn InferenceBackend>, DetectionError> {
            Ok(Box::new(FixedBackend {
                output: self.output.clone(),
            }))
        }
    }

    struct PanickingBackend;

    impl InferenceBackend for PanickingBackend {
        fn input_spec(&self) -> InputSpec {
            crate::detection::domain::inference_engine::tests::test_spec()
        }

        fn infer(&mut self, _tensor: &Tensor) -> Result<RawOutput, DetectionError> {
            panic!("kernel exploded");
        }
    }

    struct PanickingLoader;

    impl ModelLoader for PanickingLoader {
        fn load(&self, _source: &ModelSource) -> Result<Box<dyn InferenceBackend>, DetectionError> {
            Ok(Box::new(PanickingBackend))
        }
    }

    fn plugin_with(output: RawOutput) -> FaceDetectionPlugin {
        FaceDetectionPlugin::with_loader(PluginConfig::default(), Arc::new(FixedLoader { output }))
    }

    fn candidate(bbox: BoundingBox, score: f64) -> RawCandidate {
        RawCandidate {
            bbox,
            score,
            landmarks: vec![Point::new(2.0, 2.0); 6],
        }
    }

    fn args(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_blank_frame_yields_empty_faces() {
        let plugin = plugin_with(RawOutput::default());
        let data = vec![0u8; 640 * 480 * 4];
        let frame = RawFrame::new(&data, 640, 480, PixelFormat::Bgra8);

        let out = plugin.callback(&frame, None).unwrap();

        assert_eq!(out["faces"], json!([]));
        assert_eq!(out["width"], 640);
        assert_eq!(out["height"], 480);
        assert!(out["detectionTime"].as_f64().unwrap() >= 0.0);
        assert!(out.get("error").is_none());
    }

    #[test]
    fn test_model_load_failure_is_not_retried() {
        let loader = Arc::new(CountingLoader::failing());
        let plugin = FaceDetectionPlugin::with_loader(PluginConfig::default(), loader.clone());
        let data = vec![0u8; 32 * 24 * 3];
        let frame = RawFrame::new(&data, 32, 24, PixelFormat::Rgb8);

        for _ in 0..3 {
            let out = plugin.callback(&frame, None).unwrap();
            assert_eq!(out["faces"], json!([]));
            assert_eq!(out["width"], 32);
            assert_eq!(out["height"], 24);
            assert_eq!(out["detectionTime"], 0);
            assert_eq!(out["error"]["code"], "ModelLoadError");
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        plugin.reset();
        plugin.callback(&frame, None).unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_overlapping_candidates_collapse_to_strongest() {
        // IoU of these boxes is 60 / 100 = 0.6, above the 0.4 default.
        let plugin = plugin_with(RawOutput::new(vec![
            candidate(BoundingBox::new(0.0, 0.0, 10.0, 6.0), 0.7),
            candidate(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
        ]));
        let data = vec![0u8; 16 * 16 * 3];
        let frame = RawFrame::new(&data, 16, 16, PixelFormat::Rgb8);

        let out = plugin.callback(&frame, None).unwrap();

        let faces = out["faces"].as_array().unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0]["confidence"], 0.9);
        assert_eq!(faces[0]["width"], 10.0);
        assert_eq!(faces[0]["height"], 10.0);
    }

    #[test]
    fn test_landmarks_only_when_requested() {
        let plugin = plugin_with(RawOutput::new(vec![candidate(
            BoundingBox::new(1.0, 1.0, 9.0, 9.0),
            0.8,
        )]));
        let data = vec![0u8; 16 * 16 * 3];
        let frame = RawFrame::new(&data, 16, 16, PixelFormat::Rgb8);

        let plain = plugin.callback(&frame, None).unwrap();
        assert!(plain["faces"][0].get("landmarks").is_none());

        let map = args(json!({ "returnLandmarks": true }));
        let with = plugin.callback(&frame, Some(&map)).unwrap();
        let landmarks = with["faces"][0]["landmarks"].as_array().unwrap();
        assert_eq!(landmarks.len(), 6);
        assert_eq!(landmarks[0], json!({ "x": 2.0, "y": 2.0 }));
    }

    #[test]
    fn test_max_faces_keeps_highest_confidence() {
        let plugin = plugin_with(RawOutput::new(vec![
            candidate(BoundingBox::new(0.0, 0.0, 4.0, 4.0), 0.6),
            candidate(BoundingBox::new(8.0, 8.0, 12.0, 12.0), 0.95),
            candidate(BoundingBox::new(0.0, 10.0, 4.0, 14.0), 0.8),
        ]));
        let data = vec![0u8; 16 * 16 * 3];
        let frame = RawFrame::new(&data, 16, 16, PixelFormat::Rgb8);
        let map = args(json!({ "maxFaces": 2 }));

        let out = plugin.callback(&frame, Some(&map)).unwrap();

        let confidences: Vec<f64> = out["faces"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["confidence"].as_f64().unwrap())
            .collect();
        assert_eq!(confidences, vec![0.95, 0.8]);
    }

    #[test]
    fn test_invalid_arguments_report_config_error() {
        let plugin = plugin_with(RawOutput::default());
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);
        let map = args(json!({ "maxFaces": 0 }));

        let out = plugin.callback(&frame, Some(&map)).unwrap();

        assert_eq!(out["error"]["code"], "ConfigError");
        assert_eq!(out["detectionTime"], 0);
        assert_eq!(out["width"], 8);
    }

    #[test]
    fn test_unsupported_format_reported() {
        let plugin = plugin_with(RawOutput::default());
        let data = vec![0u8; 8 * 8 * 2];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Other("yuv422".into()));

        let out = plugin.callback(&frame, None).unwrap();

        assert_eq!(out["error"]["code"], "UnsupportedFormat");
        assert_eq!(out["faces"], json!([]));
    }

    #[test]
    fn test_panic_becomes_inference_error() {
        let plugin =
            FaceDetectionPlugin::with_loader(PluginConfig::default(), Arc::new(PanickingLoader));
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);

        let out = plugin.callback(&frame, None).unwrap();

        assert_eq!(out["error"]["code"], "InferenceError");
        assert!(out["error"]["message"]
            .as_str()
            .unwrap()
            .contains("kernel exploded"));
        // The in-flight slot was released during unwinding.
        assert_eq!(plugin.in_flight.in_flight(), 0);
    }

    #[test]
    fn test_throttled_frames_return_none() {
        let config = PluginConfig {
            max_frames_per_second: Some(1.0),
            ..PluginConfig::default()
        };
        let plugin = FaceDetectionPlugin::with_loader(
            config,
            Arc::new(FixedLoader {
                output: RawOutput::default(),
            }),
        );
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);

        assert!(plugin.callback(&frame, None).is_some());
        assert!(plugin.callback(&frame, None).is_none());
    }

    #[test]
    fn test_frames_beyond_limit_are_busy() {
        let config = PluginConfig {
            max_concurrent_frames: 1,
            ..PluginConfig::default()
        };
        let loader = Arc::new(CountingLoader {
            delay: Duration::from_millis(300),
            ..CountingLoader::ok()
        });
        let plugin = Arc::new(FaceDetectionPlugin::with_loader(config, loader));
        let started = Arc::new(Barrier::new(2));

        let slow = {
            let plugin = Arc::clone(&plugin);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                let data = vec![0u8; 8 * 8 * 3];
                let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);
                started.wait();
                plugin.callback(&frame, None)
            })
        };

        started.wait();
        thread::sleep(Duration::from_millis(50));
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);
        let rejected = plugin.callback(&frame, None).unwrap();
        assert_eq!(rejected["error"]["code"], "Busy");

        let first = slow.join().unwrap().unwrap();
        assert!(first.get("error").is_none());
    }

    #[test]
    fn test_eager_load_happens_at_construction() {
        let loader = Arc::new(CountingLoader::ok());
        let config = PluginConfig {
            eager_load: true,
            ..PluginConfig::default()
        };
        let plugin = FaceDetectionPlugin::with_loader(config, loader.clone());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);
        plugin.callback(&frame, None).unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_collected_timings_cover_each_frame() {
        let config = PluginConfig {
            collect_timings: true,
            ..PluginConfig::default()
        };
        let plugin = FaceDetectionPlugin::with_loader(
            config,
            Arc::new(FixedLoader {
                output: RawOutput::default(),
            }),
        );
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);

        for _ in 0..3 {
            plugin.callback(&frame, None).unwrap();
        }
        plugin.summary();

        let logger = plugin.logger.as_ref().unwrap().lock().unwrap();
        assert_eq!(logger.frames(), 3);
        for stage in [STAGE_ADAPT, STAGE_PREPROCESS, STAGE_INFERENCE, STAGE_DECODE] {
            assert_eq!(logger.timings_for(stage).unwrap().len(), 3);
        }
        assert_eq!(logger.metrics_for(METRIC_FACES).unwrap(), &[0.0, 0.0, 0.0]);
        assert!(logger
            .summary_string()
            .unwrap()
            .starts_with("Detection summary (3 frames,"));
    }

    #[test]
    fn test_timings_not_collected_by_default() {
        let plugin = plugin_with(RawOutput::default());
        assert!(plugin.logger.is_none());
    }

    #[test]
    fn test_busy_frame_does_not_consume_throttle_interval() {
        let config = PluginConfig {
            max_frames_per_second: Some(1.0),
            max_concurrent_frames: 1,
            ..PluginConfig::default()
        };
        let plugin = FaceDetectionPlugin::with_loader(
            config,
            Arc::new(FixedLoader {
                output: RawOutput::default(),
            }),
        );
        let data = vec![0u8; 8 * 8 * 3];
        let frame = RawFrame::new(&data, 8, 8, PixelFormat::Rgb8);

        {
            let _occupied = plugin.in_flight.try_enter().unwrap();
            let rejected = plugin.callback(&frame, None).unwrap();
            assert_eq!(rejected["error"]["code"], "Busy");
        }

        let out = plugin.callback(&frame, None).unwrap();
        assert!(out.get("error").is_none());
        assert!(plugin.callback(&frame, None).is_none());
    }
}
