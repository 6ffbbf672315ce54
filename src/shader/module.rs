//! The unified module handle the engine executes.

use crate::error::ValidationError;
use crate::geometry::Face;
use crate::model::{Rgba, Voxel};
use crate::plugin::{NativeCtx, NativeInstance};
use crate::shader::{
    FrameContext, HookResult, ModuleCategory, ParallelismHint, ParamDef, ParamValue,
    ScriptedShader, Stage,
};
use crate::surface::SurfaceBuffer;

/// A shader module resolved for execution: either built-in logic or a
/// native plugin instance. Both variants expose the identical capability
/// set; stage hooks return `None` when a variant does not implement them.
pub enum ShaderModule {
    Scripted(Box<dyn ScriptedShader>),
    Native(NativeInstance),
}

impl ShaderModule {
    pub fn id(&self) -> &str {
        match self {
            ShaderModule::Scripted(s) => s.id(),
            ShaderModule::Native(n) => n.id(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ShaderModule::Scripted(s) => s.display_name(),
            ShaderModule::Native(n) => n.display_name(),
        }
    }

    pub fn category(&self) -> ModuleCategory {
        match self {
            ShaderModule::Scripted(s) => s.category(),
            // The native ABI carries no category; treat plugins as effects.
            ShaderModule::Native(_) => ModuleCategory::Effect,
        }
    }

    pub fn schema(&self) -> Vec<ParamDef> {
        match self {
            ShaderModule::Scripted(s) => s.schema(),
            ShaderModule::Native(n) => n.schema(),
        }
    }

    pub fn parallelism_hint(&self) -> ParallelismHint {
        match self {
            ShaderModule::Scripted(s) => s.parallelism_hint(),
            ShaderModule::Native(n) => n.parallelism_hint(),
        }
    }

    pub fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        match self {
            ShaderModule::Scripted(s) => s.set_param(key, value),
            ShaderModule::Native(n) => n.set_param(key, value),
        }
    }

    /// Whether the module implements a given stage hook.
    pub fn implements(&self, stage: Stage) -> bool {
        match self {
            // Scripted hooks signal absence by returning None at call time;
            // probing requires a dry signature, so report optimistically and
            // let the engine treat a None return as a pass-through.
            ShaderModule::Scripted(_) => true,
            ShaderModule::Native(n) => match stage {
                Stage::Pre => n.has_pre(),
                Stage::Voxel => n.has_voxel(),
                Stage::Face => n.has_face(),
                Stage::Image => n.has_image(),
                Stage::Post => n.has_post(),
            },
        }
    }

    pub fn pre(&self, frame: &FrameContext) -> Option<HookResult<()>> {
        match self {
            ShaderModule::Scripted(s) => s.pre(frame),
            ShaderModule::Native(n) => {
                let ctx = NativeCtx::from_frame(frame, None);
                n.pre(&ctx)
            }
        }
    }

    pub fn voxel(&self, frame: &FrameContext, voxel: &Voxel, input: Rgba) -> Option<HookResult<Rgba>> {
        match self {
            ShaderModule::Scripted(s) => s.voxel(frame, voxel, input),
            ShaderModule::Native(n) => {
                let ctx = NativeCtx::from_frame(frame, None);
                n.voxel(&ctx, voxel.pos.x, voxel.pos.y, voxel.pos.z, input)
            }
        }
    }

    pub fn face(&self, frame: &FrameContext, face: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
        match self {
            ShaderModule::Scripted(s) => s.face(frame, face, input),
            ShaderModule::Native(n) => {
                let ctx = NativeCtx::from_frame(frame, None);
                n.face(
                    &ctx,
                    face.voxel.x,
                    face.voxel.y,
                    face.voxel.z,
                    face.dir.index() as i32,
                    input,
                )
            }
        }
    }

    pub fn image(&self, frame: &FrameContext, surface: &mut SurfaceBuffer) -> Option<HookResult<()>> {
        match self {
            ShaderModule::Scripted(s) => s.image(frame, surface),
            ShaderModule::Native(n) => {
                let ctx = NativeCtx::from_frame(frame, Some(surface));
                n.image(&ctx)
            }
        }
    }

    pub fn post(&self, frame: &FrameContext) -> Option<HookResult<()>> {
        match self {
            ShaderModule::Scripted(s) => s.post(frame),
            ShaderModule::Native(n) => {
                let ctx = NativeCtx::from_frame(frame, None);
                n.post(&ctx)
            }
        }
    }
}
