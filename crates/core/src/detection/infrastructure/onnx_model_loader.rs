use std::path::PathBuf;
use std::time::Duration;

use crate::detection::domain::inference_backend::{InferenceBackend, ModelLoader, ModelSource};
use crate::shared::error::DetectionError;

use super::model_resolver;
use super::onnx_blazeface_backend::OnnxBlazefaceBackend;

/// Loads BlazeFace ONNX models from files or through the model resolver.
pub struct OnnxModelLoader {
    download_timeout: Duration,
}

impl OnnxModelLoader {
    pub fn new(download_timeout: Duration) -> Self {
        Self { download_timeout }
    }

    fn model_path(&self, source: &ModelSource) -> Result<PathBuf, DetectionError> {
        match source {
            ModelSource::File(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(DetectionError::ModelLoad(format!(
                        "model file {} not found",
                        path.display()
                    )))
                }
            }
            ModelSource::Named {
                name,
                url,
                bundled_dir,
            } => Ok(model_resolver::resolve(
                name,
                url,
                bundled_dir.as_deref(),
                None,
                self.download_timeout,
            )?),
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn InferenceBackend>, DetectionError> {
        let path = self.model_path(source)?;
        Ok(Box::new(OnnxBlazefaceBackend::new(&path)?))
    }
}
