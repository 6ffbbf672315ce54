//! Sparse-voxel software rendering pipeline with a composable shader stack.
//!
//! A [`VoxelModel`] is turned into exposed faces and an unwelded triangle
//! mesh, shaded by an ordered stack of modules (built-in or loaded as
//! native plugins), depth-sorted and composited back to front into a
//! caller-owned [`SurfaceBuffer`].

pub mod context;
pub mod depth;
pub mod error;
pub mod geometry;
pub mod lighting;
pub mod model;
pub mod plugin;
pub mod shader;
pub mod stack;
pub mod surface;

pub use context::{DirLight, RenderContext, MAX_LIGHTS};
pub use error::{EngineError, ExecutionError, LoadError, ValidationError};
pub use geometry::{Face, FaceDir, GeometryProcessor, Mesh, Triangle, Vertex};
pub use model::{GridPos, Rgba, Voxel, VoxelModel};
pub use plugin::{PluginHost, PluginInfo};
pub use shader::{ModuleCategory, ParamDef, ParamValue, ScriptedRegistry, ShaderModule, Stage};
pub use stack::{
    FrameOutput, InputRouting, SafetyLimits, ShaderStack, ShaderStackConfig, ShaderStackEngine,
    StackEntry,
};
pub use surface::SurfaceBuffer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directories scanned for native shader artifacts.
    pub plugin_dirs: Vec<PathBuf>,
    pub max_primitives: usize,
    pub slow_hook_warn: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            max_primitives: stack::MAX_PRIMITIVES,
            slow_hook_warn: stack::SLOW_HOOK_WARN,
        }
    }
}

/// Convenience facade wiring the plugin host, the built-in registry and the
/// stack engine together.
pub struct RenderPipeline {
    host: Arc<PluginHost>,
    engine: ShaderStackEngine,
}

impl RenderPipeline {
    /// Build the pipeline and scan the configured plugin directories.
    pub fn new(config: PipelineConfig) -> Self {
        let host = Arc::new(PluginHost::new(config.plugin_dirs));
        let loaded = host.discover();
        if loaded > 0 {
            log::info!("loaded {} native shader module(s)", loaded);
        }
        let engine = ShaderStackEngine::new(ScriptedRegistry::with_builtins(), host.clone())
            .with_limits(SafetyLimits {
                slow_hook_warn: config.slow_hook_warn,
                max_primitives: config.max_primitives,
            });
        Self { host, engine }
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub fn engine(&self) -> &ShaderStackEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ShaderStackEngine {
        &mut self.engine
    }

    /// All resolvable module identifiers: built-ins plus loaded plugins.
    pub fn available_modules(&self) -> Vec<String> {
        let mut ids = self.engine.scripted().list();
        ids.extend(self.host.list().into_iter().map(|info| info.id));
        ids
    }

    pub fn build_stack(&self, config: &ShaderStackConfig) -> ShaderStack {
        self.engine.build_stack(config)
    }

    pub fn render_frame(
        &self,
        stack: &mut ShaderStack,
        model: &VoxelModel,
        render: &RenderContext,
        surface: &mut SurfaceBuffer,
    ) -> Result<FrameOutput, EngineError> {
        self.engine.render_frame(stack, model, render, surface)
    }
}
