//! Shader module abstraction.
//!
//! A shader module is either *scripted* (built-in Rust logic resolved by
//! identifier) or *native* (loaded from a dynamic library by the plugin
//! host). Both expose the same capability set: metadata, parameter schema,
//! per-stage hooks and a parallelism hint.

pub mod builtins;
pub mod module;
pub mod params;
pub mod scripted;

pub use module::ShaderModule;
pub use params::{validate_schema, ParamDef, ParamType, ParamValue};
pub use scripted::{ScriptedFactory, ScriptedRegistry};

use cgmath::{InnerSpace, Vector3};
use thiserror::Error;

use crate::context::RenderContext;
use crate::error::ValidationError;
use crate::geometry::Face;
use crate::model::{Rgba, Voxel, VoxelModel};
use crate::surface::SurfaceBuffer;

/// Fixed execution stages, in frame order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Pre,
    Voxel,
    Face,
    Image,
    Post,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Pre => "pre",
            Stage::Voxel => "voxel",
            Stage::Face => "face",
            Stage::Image => "image",
            Stage::Post => "post",
        }
    }
}

/// Lighting-class modules replace shading; effect-class modules post-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCategory {
    Lighting,
    Effect,
}

/// A module's self-reported preference for concurrent VOXEL/FACE invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelismHint {
    Auto,
    Serial,
    Threads(usize),
}

impl ParallelismHint {
    /// Worker count this hint resolves to on the current machine.
    pub fn resolve(self) -> usize {
        match self {
            ParallelismHint::Auto => num_cpus::get(),
            ParallelismHint::Serial => 1,
            ParallelismHint::Threads(n) => n.max(1),
        }
    }

    /// Decode the plugin ABI encoding: 0 = auto, 1 = serial, N = N threads.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ParallelismHint::Auto,
            1 => ParallelismHint::Serial,
            n if n > 1 => ParallelismHint::Threads(n as usize),
            _ => ParallelismHint::Serial,
        }
    }
}

/// Failure raised by a stage hook. Recoverable failures skip the module for
/// the current frame; fatal failures disable it for the session.
#[derive(Debug, Clone, Error)]
pub enum HookError {
    #[error("recoverable: {0}")]
    Recoverable(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type HookResult<T> = Result<T, HookError>;

/// Read-only frame state handed to every hook: the render context, the
/// model, and a couple of derived vectors every shader wants.
pub struct FrameContext<'a> {
    pub render: &'a RenderContext,
    pub model: &'a VoxelModel,
    /// Unit vector from the model toward the camera.
    pub camera_dir: Vector3<f32>,
    /// Model center in grid space.
    pub middle: Vector3<f32>,
}

impl<'a> FrameContext<'a> {
    pub fn new(render: &'a RenderContext, model: &'a VoxelModel) -> Self {
        let dims = model.dims();
        let middle = Vector3::new(
            dims.0 as f32 / 2.0,
            dims.1 as f32 / 2.0,
            dims.2 as f32 / 2.0,
        );
        let camera_dir = -render.view_dir();
        Self {
            render,
            model,
            camera_dir: if camera_dir.magnitude2() > 1e-12 {
                camera_dir.normalize()
            } else {
                Vector3::new(0.0, 0.0, 1.0)
            },
            middle,
        }
    }
}

/// The scripted-module contract. Logically identical to the native plugin
/// interface, resolved by identifier instead of dynamic loading.
///
/// Stage hooks are optional: returning `None` means "not implemented", and
/// the engine passes the module's input through unchanged. Hooks take
/// `&self` because they may be invoked concurrently (per the parallelism
/// hint); any mutable instance state must be internally synchronized.
pub trait ScriptedShader: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn category(&self) -> ModuleCategory;
    fn schema(&self) -> Vec<ParamDef>;

    fn parallelism_hint(&self) -> ParallelismHint {
        ParallelismHint::Auto
    }

    /// Apply one configured parameter. Called at stack-build time only.
    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError>;

    fn pre(&self, _ctx: &FrameContext) -> Option<HookResult<()>> {
        None
    }

    fn voxel(&self, _ctx: &FrameContext, _voxel: &Voxel, _input: Rgba) -> Option<HookResult<Rgba>> {
        None
    }

    fn face(&self, _ctx: &FrameContext, _face: &Face, _input: Rgba) -> Option<HookResult<Rgba>> {
        None
    }

    fn image(&self, _ctx: &FrameContext, _surface: &mut SurfaceBuffer) -> Option<HookResult<()>> {
        None
    }

    fn post(&self, _ctx: &FrameContext) -> Option<HookResult<()>> {
        None
    }
}
