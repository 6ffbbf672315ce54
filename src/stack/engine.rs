//! Stack resolution and frame execution.
//!
//! The engine resolves a declarative stack config into executable modules
//! (scripted registry first, then the plugin host) and drives the fixed
//! stage order PRE, VOXEL, FACE, IMAGE, POST over a frame, compositing the
//! result into the caller's surface back to front.

use std::sync::Arc;
use std::time::Duration;

use cgmath::{EuclideanSpace, Point3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::RenderContext;
use crate::depth::DepthOrderer;
use crate::error::EngineError;
use crate::geometry::{build_mesh, face_corners, Face, GeometryProcessor, Mesh};
use crate::model::{GridPos, Rgba, Voxel, VoxelModel};
use crate::plugin::PluginHost;
use crate::shader::{FrameContext, HookResult, ScriptedRegistry, ShaderModule, Stage};
use crate::stack::config::{InputRouting, ShaderStackConfig};
use crate::stack::safety::{
    Diagnostic, InvokeStatus, SafetyMonitor, MAX_PRIMITIVES, SLOW_HOOK_WARN,
};
use crate::surface::SurfaceBuffer;

/// A module bound into an executable stack.
pub struct BoundModule {
    pub module: ShaderModule,
    pub routing: InputRouting,
    /// Resolved worker count for VOXEL/FACE invocation.
    pub threads: usize,
    /// Set after a fatal hook failure; stays set for the session.
    pub disabled: bool,
}

impl BoundModule {
    pub fn id(&self) -> &str {
        self.module.id()
    }
}

/// An executable, ordered module list plus the shared worker pool.
pub struct ShaderStack {
    pub modules: Vec<BoundModule>,
    pool: Option<rayon::ThreadPool>,
}

impl ShaderStack {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id()).collect()
    }
}

/// Result of one rendered frame, over and above the pixels written to the
/// caller's surface.
pub struct FrameOutput {
    /// Exposed faces in back-to-front order.
    pub faces: Vec<Face>,
    /// Final per-face colors, index-aligned with `faces`.
    pub colors: Vec<Rgba>,
    /// The unwelded triangle mesh.
    pub mesh: Mesh,
    /// Incidents recorded during the frame.
    pub diagnostics: Vec<Diagnostic>,
}

/// Frame-safety limits, configurable per engine.
#[derive(Debug, Clone, Copy)]
pub struct SafetyLimits {
    pub slow_hook_warn: Duration,
    pub max_primitives: usize,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            slow_hook_warn: SLOW_HOOK_WARN,
            max_primitives: MAX_PRIMITIVES,
        }
    }
}

/// Resolves stack configs and renders frames.
pub struct ShaderStackEngine {
    scripted: ScriptedRegistry,
    host: Arc<PluginHost>,
    limits: SafetyLimits,
}

impl ShaderStackEngine {
    pub fn new(scripted: ScriptedRegistry, host: Arc<PluginHost>) -> Self {
        Self {
            scripted,
            host,
            limits: SafetyLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SafetyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn scripted(&self) -> &ScriptedRegistry {
        &self.scripted
    }

    pub fn scripted_mut(&mut self) -> &mut ScriptedRegistry {
        &mut self.scripted
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    /// Resolve a config into an executable stack. Unknown identifiers and
    /// bad parameters are logged and skipped; resolution never fails.
    pub fn build_stack(&self, config: &ShaderStackConfig) -> ShaderStack {
        let mut modules = Vec::new();
        for entry in config.enabled_entries() {
            let mut module = if let Some(scripted) = self.scripted.create(&entry.module_id) {
                ShaderModule::Scripted(scripted)
            } else {
                match self.host.create_instance(&entry.module_id) {
                    Ok(instance) => ShaderModule::Native(instance),
                    Err(err) => {
                        log::warn!("skipping stack entry '{}': {}", entry.module_id, err);
                        continue;
                    }
                }
            };

            for (key, value) in &entry.params {
                if let Err(err) = module.set_param(key, value) {
                    log::warn!("ignoring parameter on '{}': {}", entry.module_id, err);
                }
            }

            let threads = module.parallelism_hint().resolve();
            modules.push(BoundModule {
                module,
                routing: entry.input,
                threads,
                disabled: false,
            });
        }

        let max_threads = modules.iter().map(|m| m.threads).max().unwrap_or(1);
        let pool = if max_threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    log::warn!("worker pool unavailable, running serial: {}", err);
                    None
                }
            }
        } else {
            None
        };

        log::info!(
            "stack resolved: {} module(s), {} worker(s)",
            modules.len(),
            max_threads
        );
        ShaderStack { modules, pool }
    }

    /// Render one frame into `surface`. Module failures degrade that
    /// module's output; only whole-frame conditions return an error.
    pub fn render_frame(
        &self,
        stack: &mut ShaderStack,
        model: &VoxelModel,
        render: &RenderContext,
        surface: &mut SurfaceBuffer,
    ) -> Result<FrameOutput, EngineError> {
        if model.is_empty() {
            return Err(EngineError::EmptyModel);
        }
        if surface.width() == 0 || surface.height() == 0 {
            return Err(EngineError::ZeroSurface {
                width: surface.width(),
                height: surface.height(),
            });
        }
        if surface.width() != render.width || surface.height() != render.height {
            return Err(EngineError::SurfaceMismatch {
                got_w: surface.width(),
                got_h: surface.height(),
                want_w: render.width,
                want_h: render.height,
            });
        }

        let mut monitor = SafetyMonitor::new(self.limits.slow_hook_warn, self.limits.max_primitives);

        let mut faces = GeometryProcessor::exposed_faces(model);
        let model_view = render.view * render.model;
        DepthOrderer::sort_back_to_front(&mut faces, &model_view);
        let mesh = build_mesh(&faces);

        // Over-ceiling frames render base geometry with no module output.
        let run_modules = match monitor.check_primitive_count(mesh.triangle_count()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("skipping module stages: {}", err);
                false
            }
        };

        let frame = FrameContext::new(render, model);
        let ShaderStack { modules, pool } = stack;
        let pool = pool.as_ref();

        if run_modules {
            run_frame_hooks(modules, &frame, &mut monitor, Stage::Pre);
        }

        let voxel_colors = if run_modules {
            run_voxel_stage(modules, pool, &frame, &faces, &mut monitor)
        } else {
            faces
                .iter()
                .map(|f| (f.voxel, f.color))
                .collect::<FxHashMap<_, _>>()
        };

        let colors = if run_modules {
            run_face_stage(modules, pool, &frame, &faces, &voxel_colors, &mut monitor)
        } else {
            faces.iter().map(|f| f.color).collect()
        };

        composite(&faces, &colors, render, surface);

        if run_modules {
            for bound in modules.iter_mut().filter(|m| !m.disabled) {
                if !bound.module.implements(Stage::Image) {
                    continue;
                }
                // A failing image hook must leave no partial writes behind.
                let snapshot = surface.pixels().to_vec();
                let (_, status) = monitor.invoke(bound.module.id(), Stage::Image, (), || {
                    bound.module.image(&frame, surface)
                });
                match status {
                    InvokeStatus::Failed => surface.pixels_mut().copy_from_slice(&snapshot),
                    InvokeStatus::Fatal => {
                        surface.pixels_mut().copy_from_slice(&snapshot);
                        bound.disabled = true;
                    }
                    _ => {}
                }
            }
            run_frame_hooks(modules, &frame, &mut monitor, Stage::Post);
        }

        Ok(FrameOutput {
            faces,
            colors,
            mesh,
            diagnostics: monitor.take_diagnostics(),
        })
    }
}

/// PRE and POST run once per module, in stack order.
fn run_frame_hooks(
    modules: &mut [BoundModule],
    frame: &FrameContext,
    monitor: &mut SafetyMonitor,
    stage: Stage,
) {
    for bound in modules.iter_mut().filter(|m| !m.disabled) {
        let (_, status) = monitor.invoke(bound.module.id(), stage, (), || match stage {
            Stage::Pre => bound.module.pre(frame),
            Stage::Post => bound.module.post(frame),
            _ => None,
        });
        if status == InvokeStatus::Fatal {
            bound.disabled = true;
        }
    }
}

/// VOXEL stage: each module transforms the color of every face-owning voxel
/// once, chained in stack order.
fn run_voxel_stage(
    modules: &mut [BoundModule],
    pool: Option<&rayon::ThreadPool>,
    frame: &FrameContext,
    faces: &[Face],
    monitor: &mut SafetyMonitor,
) -> FxHashMap<GridPos, Rgba> {
    let mut seen = FxHashSet::default();
    let mut voxels: Vec<Voxel> = Vec::new();
    for face in faces {
        if seen.insert(face.voxel) {
            voxels.push(Voxel {
                pos: face.voxel,
                color: face.color,
            });
        }
    }

    let base: Vec<Rgba> = voxels.iter().map(|v| v.color).collect();
    let mut current = base.clone();

    for bound in modules.iter_mut().filter(|m| !m.disabled) {
        if !bound.module.implements(Stage::Voxel) {
            continue;
        }
        let inputs: Vec<Rgba> = voxels
            .iter()
            .enumerate()
            .map(|(i, voxel)| match bound.routing {
                InputRouting::BaseColor => base[i],
                InputRouting::PreviousOutput => current[i],
                InputRouting::Geometry => encode_normal(
                    GeometryProcessor::voxel_dominant_direction(frame.model, voxel.pos).normal(),
                ),
            })
            .collect();

        let module = &bound.module;
        let threads = bound.threads;
        let (outputs, status) = monitor.invoke(module.id(), Stage::Voxel, inputs.clone(), || {
            run_batch(pool, threads, &inputs, |i, input| {
                module.voxel(frame, &voxels[i], input)
            })
        });
        match status {
            InvokeStatus::Completed if outputs.len() == inputs.len() => current = outputs,
            InvokeStatus::Completed => monitor.record_failure(
                bound.module.id(),
                Stage::Voxel,
                format!(
                    "output shape mismatch ({} for {} inputs), keeping input",
                    outputs.len(),
                    inputs.len()
                ),
            ),
            InvokeStatus::Fatal => bound.disabled = true,
            _ => {}
        }
    }

    voxels
        .iter()
        .zip(current)
        .map(|(voxel, color)| (voxel.pos, color))
        .collect()
}

/// FACE stage: each module transforms every face color, chained in stack
/// order, with per-module input routing.
fn run_face_stage(
    modules: &mut [BoundModule],
    pool: Option<&rayon::ThreadPool>,
    frame: &FrameContext,
    faces: &[Face],
    voxel_colors: &FxHashMap<GridPos, Rgba>,
    monitor: &mut SafetyMonitor,
) -> Vec<Rgba> {
    // BaseColor routing reads the face's original color, untouched by any
    // module; the chain itself starts from the voxel-stage result.
    let base: Vec<Rgba> = faces.iter().map(|f| f.color).collect();
    let mut current: Vec<Rgba> = faces
        .iter()
        .map(|f| voxel_colors.get(&f.voxel).copied().unwrap_or(f.color))
        .collect();

    for bound in modules.iter_mut().filter(|m| !m.disabled) {
        if !bound.module.implements(Stage::Face) {
            continue;
        }
        let inputs: Vec<Rgba> = faces
            .iter()
            .enumerate()
            .map(|(i, face)| match bound.routing {
                InputRouting::BaseColor => base[i],
                InputRouting::PreviousOutput => current[i],
                InputRouting::Geometry => encode_normal(face.normal),
            })
            .collect();

        let module = &bound.module;
        let threads = bound.threads;
        let (outputs, status) = monitor.invoke(module.id(), Stage::Face, inputs.clone(), || {
            run_batch(pool, threads, &inputs, |i, input| {
                module.face(frame, &faces[i], input)
            })
        });
        match status {
            InvokeStatus::Completed if outputs.len() == inputs.len() => current = outputs,
            InvokeStatus::Completed => monitor.record_failure(
                bound.module.id(),
                Stage::Face,
                format!(
                    "output shape mismatch ({} for {} inputs), keeping input",
                    outputs.len(),
                    inputs.len()
                ),
            ),
            InvokeStatus::Fatal => bound.disabled = true,
            _ => {}
        }
    }

    current
}

/// Painter-order composite: project each face quad through the MVP transform
/// and scanline-fill it, farthest first.
fn composite(faces: &[Face], colors: &[Rgba], render: &RenderContext, surface: &mut SurfaceBuffer) {
    let mvp = render.projection * render.view * render.model;
    let w = surface.width() as f32;
    let h = surface.height() as f32;

    'faces: for (face, &color) in faces.iter().zip(colors) {
        if color.a == 0 {
            continue;
        }
        let corners = face_corners(face);
        let mut xs = [0.0f32; 4];
        let mut ys = [0.0f32; 4];
        for (i, corner) in corners.iter().enumerate() {
            let p = Point3::new(corner.position.x, corner.position.y, corner.position.z);
            let clip = mvp * p.to_homogeneous();
            if clip.w < 1e-6 {
                continue 'faces;
            }
            let ndc_x = clip.x / clip.w;
            let ndc_y = clip.y / clip.w;
            xs[i] = (ndc_x * 0.5 + 0.5) * w;
            ys[i] = (1.0 - (ndc_y * 0.5 + 0.5)) * h;
        }
        surface.fill_quad(&xs, &ys, color);
    }
}

/// Pack a unit normal into RGB, one channel per axis.
fn encode_normal(normal: cgmath::Vector3<f32>) -> Rgba {
    let map = |c: f32| ((c * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    Rgba::new(map(normal.x), map(normal.y), map(normal.z), 255)
}

/// Run a per-item hook over a batch, serially or on the worker pool. The
/// first unimplemented item marks the whole batch unimplemented; any item
/// failure fails the batch, so a module's output is all or nothing.
fn run_batch<F>(
    pool: Option<&rayon::ThreadPool>,
    threads: usize,
    inputs: &[Rgba],
    hook: F,
) -> Option<HookResult<Vec<Rgba>>>
where
    F: Fn(usize, Rgba) -> Option<HookResult<Rgba>> + Sync,
{
    let results: Vec<Option<HookResult<Rgba>>> = match pool {
        Some(pool) if threads > 1 => {
            use rayon::prelude::*;
            pool.install(|| {
                inputs
                    .par_iter()
                    .enumerate()
                    .map(|(i, &input)| hook(i, input))
                    .collect()
            })
        }
        _ => inputs
            .iter()
            .enumerate()
            .map(|(i, &input)| hook(i, input))
            .collect(),
    };

    let mut out = Vec::with_capacity(results.len());
    for result in results {
        match result {
            None => return None,
            Some(Ok(color)) => out.push(color),
            Some(Err(err)) => return Some(Err(err)),
        }
    }
    Some(Ok(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::shader::{
        HookError, ModuleCategory, ParamDef, ParamValue, ParallelismHint, ScriptedShader,
    };
    use crate::stack::config::StackEntry;

    fn engine() -> ShaderStackEngine {
        ShaderStackEngine::new(
            ScriptedRegistry::with_builtins(),
            Arc::new(PluginHost::new(Vec::new())),
        )
    }

    fn single_voxel_model() -> VoxelModel {
        let mut model = VoxelModel::new();
        model.insert(GridPos::new(0, 0, 0), Rgba::new(200, 100, 50, 255));
        model
    }

    struct Failing {
        error: HookError,
    }

    impl ScriptedShader for Failing {
        fn id(&self) -> &str {
            "test.failing"
        }
        fn display_name(&self) -> &str {
            "Failing"
        }
        fn category(&self) -> ModuleCategory {
            ModuleCategory::Effect
        }
        fn schema(&self) -> Vec<ParamDef> {
            vec![ParamDef::new("unused", ParamValue::Bool(false))]
        }
        fn parallelism_hint(&self) -> ParallelismHint {
            ParallelismHint::Serial
        }
        fn set_param(&mut self, _: &str, _: &ParamValue) -> Result<(), ValidationError> {
            Ok(())
        }
        fn face(&self, _: &FrameContext, _: &Face, _: Rgba) -> Option<HookResult<Rgba>> {
            Some(Err(self.error.clone()))
        }
    }

    struct Panicking;

    impl ScriptedShader for Panicking {
        fn id(&self) -> &str {
            "test.panicking"
        }
        fn display_name(&self) -> &str {
            "Panicking"
        }
        fn category(&self) -> ModuleCategory {
            ModuleCategory::Effect
        }
        fn schema(&self) -> Vec<ParamDef> {
            vec![ParamDef::new("unused", ParamValue::Bool(false))]
        }
        fn parallelism_hint(&self) -> ParallelismHint {
            ParallelismHint::Serial
        }
        fn set_param(&mut self, _: &str, _: &ParamValue) -> Result<(), ValidationError> {
            Ok(())
        }
        fn face(&self, _: &FrameContext, _: &Face, _: Rgba) -> Option<HookResult<Rgba>> {
            panic!("deliberate test panic");
        }
    }

    struct RecolorVoxels;

    impl ScriptedShader for RecolorVoxels {
        fn id(&self) -> &str {
            "test.recolor"
        }
        fn display_name(&self) -> &str {
            "Recolor"
        }
        fn category(&self) -> ModuleCategory {
            ModuleCategory::Effect
        }
        fn schema(&self) -> Vec<ParamDef> {
            Vec::new()
        }
        fn parallelism_hint(&self) -> ParallelismHint {
            ParallelismHint::Serial
        }
        fn set_param(&mut self, _: &str, _: &ParamValue) -> Result<(), ValidationError> {
            Ok(())
        }
        fn voxel(&self, _: &FrameContext, _: &Voxel, _: Rgba) -> Option<HookResult<Rgba>> {
            Some(Ok(Rgba::new(1, 1, 1, 255)))
        }
    }

    struct FacePassthrough;

    impl ScriptedShader for FacePassthrough {
        fn id(&self) -> &str {
            "test.passthrough"
        }
        fn display_name(&self) -> &str {
            "Passthrough"
        }
        fn category(&self) -> ModuleCategory {
            ModuleCategory::Effect
        }
        fn schema(&self) -> Vec<ParamDef> {
            Vec::new()
        }
        fn parallelism_hint(&self) -> ParallelismHint {
            ParallelismHint::Serial
        }
        fn set_param(&mut self, _: &str, _: &ParamValue) -> Result<(), ValidationError> {
            Ok(())
        }
        fn face(&self, _: &FrameContext, _: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
            Some(Ok(input))
        }
    }

    struct ScribbleThenPanic;

    impl ScriptedShader for ScribbleThenPanic {
        fn id(&self) -> &str {
            "test.scribble"
        }
        fn display_name(&self) -> &str {
            "Scribble"
        }
        fn category(&self) -> ModuleCategory {
            ModuleCategory::Effect
        }
        fn schema(&self) -> Vec<ParamDef> {
            Vec::new()
        }
        fn parallelism_hint(&self) -> ParallelismHint {
            ParallelismHint::Serial
        }
        fn set_param(&mut self, _: &str, _: &ParamValue) -> Result<(), ValidationError> {
            Ok(())
        }
        fn image(&self, _: &FrameContext, surface: &mut SurfaceBuffer) -> Option<HookResult<()>> {
            surface.set_pixel(0, 0, Rgba::new(99, 99, 99, 99));
            panic!("deliberate test panic");
        }
    }

    #[test]
    fn test_empty_model_rejected() {
        let engine = engine();
        let mut stack = engine.build_stack(&ShaderStackConfig::new());
        let model = VoxelModel::new();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        assert!(matches!(
            engine.render_frame(&mut stack, &model, &render, &mut surface),
            Err(EngineError::EmptyModel)
        ));
    }

    #[test]
    fn test_surface_mismatch_rejected() {
        let engine = engine();
        let mut stack = engine.build_stack(&ShaderStackConfig::new());
        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(16, 16);
        assert!(matches!(
            engine.render_frame(&mut stack, &model, &render, &mut surface),
            Err(EngineError::SurfaceMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_stack_passes_base_colors() {
        let engine = engine();
        let mut stack = engine.build_stack(&ShaderStackConfig::new());
        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert_eq!(output.faces.len(), 6);
        assert_eq!(output.mesh.triangle_count(), 12);
        assert!(output
            .colors
            .iter()
            .all(|&c| c == Rgba::new(200, 100, 50, 255)));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_module_skipped_at_build() {
        let engine = engine();
        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("builtin.basic"));
        config.push(StackEntry::new("does.not.exist"));
        let stack = engine.build_stack(&config);
        assert_eq!(stack.module_ids(), vec!["builtin.basic"]);
    }

    #[test]
    fn test_recoverable_failure_passes_input_through() {
        let mut engine = engine();
        engine.scripted_mut().register("test.failing", || {
            Box::new(Failing {
                error: HookError::Recoverable("skip".into()),
            })
        });

        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.failing"));
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();

        assert!(output
            .colors
            .iter()
            .all(|&c| c == Rgba::new(200, 100, 50, 255)));
        assert_eq!(output.diagnostics.len(), 1);
        // Recoverable: the module is eligible again next frame.
        assert!(!stack.modules[0].disabled);
    }

    #[test]
    fn test_fatal_failure_disables_for_session() {
        let mut engine = engine();
        engine.scripted_mut().register("test.failing", || {
            Box::new(Failing {
                error: HookError::Fatal("broken".into()),
            })
        });

        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.failing"));
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);

        engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert!(stack.modules[0].disabled);

        // Second frame: the disabled module produces no diagnostics at all.
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_panicking_module_isolated_from_others() {
        let mut engine = engine();
        engine
            .scripted_mut()
            .register("test.panicking", || Box::new(Panicking));

        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.panicking"));
        config.push(StackEntry::new("builtin.faceshade"));
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();

        // The panic is contained; the downstream module still ran.
        let top_idx = output
            .faces
            .iter()
            .position(|f| f.dir == crate::geometry::FaceDir::Top)
            .unwrap();
        assert_eq!(output.colors[top_idx], Rgba::new(255, 255, 0, 255));
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.module_id == "test.panicking"));
    }

    #[test]
    fn test_base_color_routing_ignores_previous_module() {
        let engine = engine();
        let mut config = ShaderStackConfig::new();
        // First module recolors everything; second reads base colors anyway.
        config.push(StackEntry::new("builtin.faceshade"));
        config.push(
            StackEntry::new("builtin.faceshade").with_input(InputRouting::BaseColor),
        );
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();

        // Literal mode overwrites either way; alpha comes from the base.
        assert!(output.colors.iter().all(|c| c.a == 255));
        assert_eq!(output.faces.len(), 6);
    }

    #[test]
    fn test_base_color_routing_reads_original_face_color() {
        let mut engine = engine();
        engine
            .scripted_mut()
            .register("test.recolor", || Box::new(RecolorVoxels));
        engine
            .scripted_mut()
            .register("test.passthrough", || Box::new(FacePassthrough));

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);

        // A voxel-stage recolor followed by a BaseColor-routed passthrough:
        // the routing must read the face's untouched color.
        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.recolor"));
        config.push(StackEntry::new("test.passthrough").with_input(InputRouting::BaseColor));
        let mut stack = engine.build_stack(&config);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert!(output
            .colors
            .iter()
            .all(|&c| c == Rgba::new(200, 100, 50, 255)));

        // With default routing the same passthrough carries the recolor.
        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.recolor"));
        config.push(StackEntry::new("test.passthrough"));
        let mut stack = engine.build_stack(&config);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert!(output.colors.iter().all(|&c| c == Rgba::new(1, 1, 1, 255)));
    }

    #[test]
    fn test_failed_image_hook_leaves_no_partial_writes() {
        let mut engine = engine();
        engine
            .scripted_mut()
            .register("test.scribble", || Box::new(ScribbleThenPanic));

        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("test.scribble"));
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();

        // The pixel write landed before the panic; the restore erases it.
        assert_ne!(surface.get_pixel(0, 0), Some(Rgba::new(99, 99, 99, 99)));
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.stage == Stage::Image && d.module_id == "test.scribble"));
    }

    #[test]
    fn test_over_ceiling_renders_base_colors() {
        let engine = engine().with_limits(SafetyLimits {
            slow_hook_warn: SLOW_HOOK_WARN,
            max_primitives: 4,
        });
        let mut config = ShaderStackConfig::new();
        config.push(StackEntry::new("builtin.faceshade"));
        let mut stack = engine.build_stack(&config);

        let model = single_voxel_model();
        let render = RenderContext::new(8, 8);
        let mut surface = SurfaceBuffer::new(8, 8);
        let output = engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();

        // 12 triangles exceed the ceiling of 4: module output discarded.
        assert!(output
            .colors
            .iter()
            .all(|&c| c == Rgba::new(200, 100, 50, 255)));
    }

    #[test]
    fn test_composite_writes_pixels() {
        let engine = engine();
        let mut stack = engine.build_stack(&ShaderStackConfig::new());
        let model = single_voxel_model();
        let mut render = RenderContext::new(16, 16);
        // Orthographic-ish projection placing the voxel at screen center.
        render.projection = cgmath::ortho(-2.0, 2.0, -2.0, 2.0, -10.0, 10.0);
        let mut surface = SurfaceBuffer::new(16, 16);
        engine
            .render_frame(&mut stack, &model, &render, &mut surface)
            .unwrap();
        assert_eq!(
            surface.get_pixel(8, 8),
            Some(Rgba::new(200, 100, 50, 255))
        );
    }
}
