use serde::Deserialize;
use serde_json::Value;

use super::frame_processor_plugin::Options;
use crate::shared::error::DetectionError;

const KNOWN_KEYS: [&str; 3] = ["confidenceThreshold", "maxFaces", "returnLandmarks"];

/// Per-call options passed alongside each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectOptions {
    pub confidence_threshold: f64,
    /// `None` keeps every face that survives NMS.
    pub max_faces: Option<usize>,
    pub return_landmarks: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetectOptions {
    confidence_threshold: Option<f64>,
    /// Bridged hosts may deliver integers as doubles, so any integral number is accepted.
    max_faces: Option<f64>,
    return_landmarks: Option<bool>,
}

impl DetectOptions {
    pub fn with_confidence(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            max_faces: None,
            return_landmarks: false,
        }
    }

    /// Parse the host's argument map, falling back to `default_confidence`.
    ///
    /// Wrong types and out-of-range values are `ConfigError`s. Unknown keys
    /// are ignored.
    pub fn parse(
        arguments: Option<&Options>,
        default_confidence: f64,
    ) -> Result<Self, DetectionError> {
        let mut options = Self::with_confidence(default_confidence);
        let Some(arguments) = arguments else {
            return Ok(options);
        };

        for key in arguments.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                log::debug!("Ignoring unknown detect option '{key}'");
            }
        }

        let raw: RawDetectOptions = serde_json::from_value(Value::Object(arguments.clone()))
            .map_err(|e| DetectionError::Config(e.to_string()))?;

        if let Some(confidence) = raw.confidence_threshold {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(DetectionError::Config(format!(
                    "confidenceThreshold must be within [0, 1], got {confidence}"
                )));
            }
            options.confidence_threshold = confidence;
        }

        if let Some(max_faces) = raw.max_faces {
            if !max_faces.is_finite() || max_faces.fract() != 0.0 || max_faces < 1.0 {
                return Err(DetectionError::Config(format!(
                    "maxFaces must be an integer of at least 1, got {max_faces}"
                )));
            }
            // Saturating cast; anything past usize::MAX is unbounded anyway.
            options.max_faces = Some(max_faces as usize);
        }

        if let Some(landmarks) = raw.return_landmarks {
            options.return_landmarks = landmarks;
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use serde_json::json;

    fn args(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_missing_arguments_use_defaults() {
        let options = DetectOptions::parse(None, 0.5).unwrap();
        assert_eq!(options, DetectOptions::with_confidence(0.5));
        assert_eq!(options.max_faces, None);
        assert!(!options.return_landmarks);
    }

    #[test]
    fn test_all_keys_parsed() {
        let map = args(json!({
            "confidenceThreshold": 0.7,
            "maxFaces": 3,
            "returnLandmarks": true,
        }));
        let options = DetectOptions::parse(Some(&map), 0.5).unwrap();
        assert_relative_eq!(options.confidence_threshold, 0.7);
        assert_eq!(options.max_faces, Some(3));
        assert!(options.return_landmarks);
    }

    #[rstest]
    #[case(json!({ "maxFaces": 2 }), 2)]
    #[case(json!({ "maxFaces": 2.0 }), 2)]
    #[case(json!({ "maxFaces": 1e30 }), usize::MAX)]
    fn test_max_faces_accepts_integral_numbers(#[case] value: Value, #[case] expected: usize) {
        let map = args(value);
        let options = DetectOptions::parse(Some(&map), 0.5).unwrap();
        assert_eq!(options.max_faces, Some(expected));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let map = args(json!({ "mirror": true, "maxFaces": 1 }));
        let options = DetectOptions::parse(Some(&map), 0.5).unwrap();
        assert_eq!(options.max_faces, Some(1));
    }

    #[test]
    fn test_null_values_fall_back_to_defaults() {
        let map = args(json!({ "confidenceThreshold": null }));
        let options = DetectOptions::parse(Some(&map), 0.6).unwrap();
        assert_relative_eq!(options.confidence_threshold, 0.6);
    }

    #[rstest]
    #[case(json!({ "confidenceThreshold": "high" }))]
    #[case(json!({ "confidenceThreshold": 1.5 }))]
    #[case(json!({ "confidenceThreshold": -0.1 }))]
    #[case(json!({ "maxFaces": 0 }))]
    #[case(json!({ "maxFaces": -2 }))]
    #[case(json!({ "maxFaces": 2.5 }))]
    #[case(json!({ "maxFaces": 0.0 }))]
    #[case(json!({ "maxFaces": "3" }))]
    #[case(json!({ "returnLandmarks": "yes" }))]
    fn test_invalid_values_are_config_errors(#[case] value: Value) {
        let map = args(value);
        let err = DetectOptions::parse(Some(&map), 0.5).unwrap_err();
        assert_eq!(err.code(), "ConfigError");
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    fn test_confidence_bounds_are_inclusive(#[case] confidence: f64) {
        let map = args(json!({ "confidenceThreshold": confidence }));
        let options = DetectOptions::parse(Some(&map), 0.5).unwrap();
        assert_relative_eq!(options.confidence_threshold, confidence);
    }
}
