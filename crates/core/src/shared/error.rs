use thiserror::Error;

/// Every failure the detection pipeline can produce.
///
/// The plugin boundary never propagates these; it converts them into an
/// empty result carrying [`DetectionError::code`] and the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),
    #[error("preprocessing failed: {0}")]
    Preprocess(String),
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid option: {0}")]
    Config(String),
    #[error("frame rejected: {0}")]
    Busy(String),
}

impl DetectionError {
    /// Stable identifier reported to the host in the `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::Preprocess(_) => "PreprocessError",
            Self::ModelLoad(_) => "ModelLoadError",
            Self::Inference(_) => "InferenceError",
            Self::Config(_) => "ConfigError",
            Self::Busy(_) => "Busy",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::UnsupportedFormat(m)
            | Self::Preprocess(m)
            | Self::ModelLoad(m)
            | Self::Inference(m)
            | Self::Config(m)
            | Self::Busy(m) => m,
        }
    }
}
