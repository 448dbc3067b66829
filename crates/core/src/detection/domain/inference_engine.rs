//! Model lifecycle: load once per source, bounded by a timeout, then share.
//!
//! A failed load is remembered so per-frame callers short-circuit instead of
//! retrying; only [`InferenceEngine::reset`] allows another attempt.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;

use super::inference_backend::{InferenceBackend, ModelLoader, ModelSource};
use super::raw_output::RawOutput;
use crate::preprocessing::domain::letterbox::{InputSpec, Tensor};
use crate::shared::error::DetectionError;

/// Shared handle to a loaded model. Cloning is cheap.
#[derive(Clone)]
pub struct ModelHandle {
    source: ModelSource,
    spec: InputSpec,
    backend: Arc<Mutex<Box<dyn InferenceBackend>>>,
}

impl ModelHandle {
    fn new(source: ModelSource, backend: Box<dyn InferenceBackend>) -> Self {
        Self {
            source,
            spec: backend.input_spec(),
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn input_spec(&self) -> InputSpec {
        self.spec
    }

    /// Whether both handles refer to the same loaded instance.
    pub fn same_instance(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    /// Run the model. Calls from different threads are serialized.
    pub fn infer(&self, tensor: &Tensor) -> Result<RawOutput, DetectionError> {
        let expected = self.spec.shape();
        if tensor.shape() != expected {
            return Err(DetectionError::Inference(format!(
                "tensor shape {:?} does not match model input {expected:?}",
                tensor.shape()
            )));
        }
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| DetectionError::Inference("backend poisoned by an earlier panic".into()))?;
        backend.infer(tensor)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("source", &self.source)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

enum LoadState {
    Unloaded,
    Loaded(ModelHandle),
    Failed {
        source: ModelSource,
        error: DetectionError,
    },
}

pub struct InferenceEngine {
    loader: Arc<dyn ModelLoader>,
    load_timeout: Duration,
    state: Mutex<LoadState>,
}

impl InferenceEngine {
    pub fn new(loader: Arc<dyn ModelLoader>, load_timeout: Duration) -> Self {
        Self {
            loader,
            load_timeout,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// Load `source`, or return the cached handle / cached failure for it.
    ///
    /// Concurrent first callers block on the same load rather than racing.
    pub fn load_model(&self, source: &ModelSource) -> Result<ModelHandle, DetectionError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DetectionError::ModelLoad("engine state poisoned".into()))?;

        match &*state {
            LoadState::Loaded(handle) if handle.source() == source => return Ok(handle.clone()),
            LoadState::Failed { source: failed, error } if failed == source => {
                return Err(error.clone())
            }
            _ => {}
        }

        let started = Instant::now();
        let result = self.load_bounded(source);
        *state = match &result {
            Ok(handle) => {
                log::info!(
                    "Loaded model {source} in {:.1}ms",
                    started.elapsed().as_secs_f64() * 1000.0
                );
                LoadState::Loaded(handle.clone())
            }
            Err(e) => {
                log::error!("Model {source} is unusable until reset: {e}");
                LoadState::Failed {
                    source: source.clone(),
                    error: e.clone(),
                }
            }
        };
        result
    }

    /// Handle of the currently loaded model, if any.
    pub fn loaded(&self) -> Option<ModelHandle> {
        let state = self.state.lock().ok()?;
        match &*state {
            LoadState::Loaded(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn infer(&self, handle: &ModelHandle, tensor: &Tensor) -> Result<RawOutput, DetectionError> {
        handle.infer(tensor)
    }

    /// Forget any loaded model or remembered failure.
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LoadState::Unloaded;
        }
    }

    fn load_bounded(&self, source: &ModelSource) -> Result<ModelHandle, DetectionError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let loader = Arc::clone(&self.loader);
        let thread_source = source.clone();
        thread::Builder::new()
            .name("model-load".into())
            .spawn(move || {
                // The receiver is gone if the load already timed out.
                let _ = tx.send(loader.load(&thread_source));
            })
            .map_err(|e| DetectionError::ModelLoad(format!("cannot spawn loader thread: {e}")))?;

        match rx.recv_timeout(self.load_timeout) {
            Ok(Ok(backend)) => Ok(ModelHandle::new(source.clone(), backend)),
            Ok(Err(DetectionError::ModelLoad(msg))) => Err(DetectionError::ModelLoad(msg)),
            Ok(Err(other)) => Err(DetectionError::ModelLoad(other.to_string())),
            Err(RecvTimeoutError::Timeout) => Err(DetectionError::ModelLoad(format!(
                "loading {source} timed out after {}ms",
                self.load_timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(DetectionError::ModelLoad(format!(
                "loader for {source} exited without a result"
            ))),
        }
    }
}
