use std::path::Path;

use ort::session::Session;

use crate::shared::error::DetectionError;

/// Return the preferred ONNX execution providers for the current platform.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Create a session on the preferred accelerator, degrading to CPU if the
/// accelerated session cannot be built.
pub fn build_session(model_path: &Path) -> Result<Session, DetectionError> {
    let providers = preferred_execution_providers();
    if !providers.is_empty() {
        match try_build(model_path, providers) {
            Ok(session) => return Ok(session),
            Err(e) => log::warn!("Accelerated session unavailable, falling back to CPU: {e}"),
        }
    }

    try_build(model_path, Vec::new()).map_err(|e| {
        DetectionError::ModelLoad(format!("cannot load {}: {e}", model_path.display()))
    })
}

fn try_build(
    model_path: &Path,
    providers: Vec<ort::execution_providers::ExecutionProviderDispatch>,
) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_execution_providers(providers)?
        .commit_from_file(model_path)?;
    Ok(session)
}
