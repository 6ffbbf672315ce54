//! Registry of scripted shader modules.

use rustc_hash::FxHashMap;

use crate::shader::builtins::{BasicLighting, DynamicLighting, FaceShade, PhongLighting};
use crate::shader::ScriptedShader;

/// Constructs a fresh instance of a scripted module.
pub type ScriptedFactory = fn() -> Box<dyn ScriptedShader>;

/// Identifier-keyed factory table for scripted modules. Stack resolution
/// consults this registry before falling back to the plugin host.
pub struct ScriptedRegistry {
    factories: FxHashMap<String, ScriptedFactory>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Registry pre-populated with the built-in modules.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(BasicLighting::ID, || Box::new(BasicLighting::default()));
        registry.register(DynamicLighting::ID, || Box::new(DynamicLighting::default()));
        registry.register(FaceShade::ID, || Box::new(FaceShade::default()));
        registry.register(PhongLighting::ID, || Box::new(PhongLighting::default()));
        registry
    }

    /// Registers a factory. Re-registering an identifier replaces the
    /// previous factory.
    pub fn register(&mut self, id: &str, factory: ScriptedFactory) {
        if self.factories.insert(id.to_string(), factory).is_some() {
            log::warn!("scripted module '{}' re-registered, replacing factory", id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Creates a fresh instance, or `None` for an unknown identifier.
    pub fn create(&self, id: &str) -> Option<Box<dyn ScriptedShader>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Registered identifiers, sorted for stable listings.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ScriptedRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
