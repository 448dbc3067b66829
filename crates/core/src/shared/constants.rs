/// Name the face detector registers under in the plugin registry.
pub const DETECT_FACES_PLUGIN_NAME: &str = "detectFaces";

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const BLAZEFACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceframe/releases/download/v0.1.0/blazeface_short_range.onnx";

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.4;

/// Upper bound on a model load, including any download.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;

/// Concurrent frames admitted before new ones are rejected as busy.
pub const DEFAULT_MAX_CONCURRENT_FRAMES: usize = 2;
