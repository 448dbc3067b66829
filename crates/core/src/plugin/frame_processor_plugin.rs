use serde_json::{Map, Value};

use crate::shared::frame::RawFrame;

/// Option maps exchanged with the host, keyed by camelCase names.
pub type Options = Map<String, Value>;

/// A frame processor the host can invoke once per camera frame.
///
/// Implementations must not panic across this boundary; failures are reported
/// inside the returned map. `None` means the frame was not processed.
pub trait FrameProcessorPlugin: Send + Sync {
    fn callback(&self, frame: &RawFrame<'_>, arguments: Option<&Options>) -> Option<Value>;

    /// Emit any statistics collected across calls. Default: no-op.
    fn summary(&self) {}
}
