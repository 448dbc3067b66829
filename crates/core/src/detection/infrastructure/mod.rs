pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_blazeface_backend;
pub mod onnx_model_loader;
