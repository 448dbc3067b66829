use std::fmt;
use std::path::PathBuf;

use super::raw_output::RawOutput;
use crate::preprocessing::domain::letterbox::{InputSpec, Tensor};
use crate::shared::error::DetectionError;

/// A loaded detection model.
///
/// Backends may keep scratch state between runs, hence `&mut self`; the
/// engine serializes access so implementations need not be reentrant.
pub trait InferenceBackend: Send {
    fn input_spec(&self) -> InputSpec;

    /// Run the model on a tensor of shape `input_spec().shape()`.
    ///
    /// Zero candidates is a successful outcome, not an error.
    fn infer(&mut self, tensor: &Tensor) -> Result<RawOutput, DetectionError>;
}

/// Where a model comes from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelSource {
    /// A model file on disk, typically bundled with the app.
    File(PathBuf),
    /// A model resolved by name: user cache, then `bundled_dir`, then `url`.
    Named {
        name: String,
        url: String,
        bundled_dir: Option<PathBuf>,
    },
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Named { name, .. } => write!(f, "{name}"),
        }
    }
}

/// Creates backends from model sources.
pub trait ModelLoader: Send + Sync {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn InferenceBackend>, DetectionError>;
}
