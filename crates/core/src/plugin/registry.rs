use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use super::face_detection_plugin::FaceDetectionPlugin;
use super::frame_processor_plugin::{FrameProcessorPlugin, Options};
use crate::shared::constants::DETECT_FACES_PLUGIN_NAME;
use crate::shared::error::DetectionError;

/// Builds a plugin instance from the host's construction options.
pub type PluginFactory =
    fn(Option<&Options>) -> Result<Box<dyn FrameProcessorPlugin>, DetectionError>;

/// Name → factory table the host looks plugins up in.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<HashMap<String, PluginFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static PluginRegistry {
        static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PluginRegistry::new)
    }

    /// Register `factory` under `name`. Returns `false` and keeps the
    /// existing entry when the name is already taken.
    pub fn register(&self, name: &str, factory: PluginFactory) -> bool {
        let Ok(mut factories) = self.factories.write() else {
            return false;
        };
        if factories.contains_key(name) {
            log::debug!("Plugin '{name}' already registered");
            return false;
        }
        factories.insert(name.to_string(), factory);
        log::debug!("Registered plugin '{name}'");
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .map(|factories| factories.contains_key(name))
            .unwrap_or(false)
    }

    pub fn create(
        &self,
        name: &str,
        options: Option<&Options>,
    ) -> Result<Box<dyn FrameProcessorPlugin>, DetectionError> {
        let factory = self
            .factories
            .read()
            .map_err(|_| DetectionError::Config("plugin registry poisoned".into()))?
            .get(name)
            .copied()
            .ok_or_else(|| DetectionError::Config(format!("no plugin registered as '{name}'")))?;
        factory(options)
    }
}

fn create_face_detection_plugin(
    options: Option<&Options>,
) -> Result<Box<dyn FrameProcessorPlugin>, DetectionError> {
    Ok(Box::new(FaceDetectionPlugin::from_options(options)?))
}

/// Register every built-in plugin with the global registry.
///
/// Safe to call more than once; returns whether anything new was added.
pub fn register_plugins() -> bool {
    register_into(PluginRegistry::global())
}

fn register_into(registry: &PluginRegistry) -> bool {
    registry.register(DETECT_FACES_PLUGIN_NAME, create_face_detection_plugin)
}
