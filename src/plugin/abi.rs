//! Stable C ABI for native shader modules.
//!
//! Every artifact exports a single entry point returning a function table.
//! Optional hooks are nullable function pointers; on the Rust side absence
//! is an explicit `None`, never a missing-symbol probe. The major version
//! must match the host exactly; minor bumps stay backward compatible.

use std::os::raw::{c_char, c_int, c_void};

use cgmath::Matrix4;

use crate::context::{RenderContext, MAX_LIGHTS};
use crate::model::VoxelModel;
use crate::shader::FrameContext;
use crate::surface::SurfaceBuffer;

/// Major interface version supported by this host.
pub const PLUGIN_API_MAJOR: i32 = 1;

/// Entry-point symbol every artifact must export.
pub const ENTRY_SYMBOL: &[u8] = b"voxstack_shader_entry_v1\0";

/// Artifact base name: `<dll prefix>voxstack_shader_<name><dll suffix>`.
pub const ARTIFACT_STEM: &str = "voxstack_shader_";

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeVersion {
    pub major: c_int,
    pub minor: c_int,
    pub patch: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeLight {
    pub dir: [f32; 3],
    pub intensity: f32,
    pub spec_power: f32,
}

/// Execution context passed to every native hook. Matrices are column-major.
#[repr(C)]
pub struct NativeCtx {
    pub model_mat: [f32; 16],
    pub view_mat: [f32; 16],
    pub proj_mat: [f32; 16],
    /// Camera orientation quaternion (x, y, z, w).
    pub q_view: [f32; 4],
    pub num_lights: c_int,
    pub lights: [NativeLight; MAX_LIGHTS],
    /// Opaque voxel model handle for the host query helpers.
    pub model: *const c_void,
    /// Host-provided RGBA output buffer (IMAGE stage), or null.
    pub output_buffer: *mut u8,
    /// Bytes per row of the output buffer.
    pub output_stride: c_int,
    pub time_sec: f32,
    pub width: c_int,
    pub height: c_int,
}

/// Parameter type tags, matching `ParamType` order.
pub const NATIVE_T_BOOL: c_int = 0;
pub const NATIVE_T_INT: c_int = 1;
pub const NATIVE_T_FLOAT: c_int = 2;
pub const NATIVE_T_VEC3: c_int = 3;
pub const NATIVE_T_COLOR: c_int = 4;
pub const NATIVE_T_STRING: c_int = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeParamDef {
    pub key: *const c_char,
    pub ty: c_int,
    pub default_val: *const c_void,
    pub display_name: *const c_char,
    pub tooltip: *const c_char,
}

/// Hook return codes: 0 success, 1 recoverable (skip this frame), >= 2
/// fatal (disable for session).
pub const HOOK_OK: c_int = 0;
pub const HOOK_SKIP: c_int = 1;
pub const HOOK_FATAL: c_int = 2;

/// The v1 function table. Metadata functions are mandatory; lifecycle and
/// stage hooks are individually optional.
#[repr(C)]
pub struct NativeShaderV1 {
    pub api_version: unsafe extern "C" fn() -> NativeVersion,
    pub shader_id: unsafe extern "C" fn() -> *const c_char,
    pub display_name: Option<unsafe extern "C" fn() -> *const c_char>,
    pub params_schema: Option<unsafe extern "C" fn(out_count: *mut c_int) -> *const NativeParamDef>,
    pub create: Option<unsafe extern "C" fn() -> *mut c_void>,
    pub destroy: Option<unsafe extern "C" fn(instance: *mut c_void)>,
    pub set_param: Option<
        unsafe extern "C" fn(instance: *mut c_void, key: *const c_char, value: *const c_void) -> c_int,
    >,
    pub run_pre: Option<unsafe extern "C" fn(instance: *mut c_void, ctx: *const NativeCtx) -> c_int>,
    pub run_voxel: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            ctx: *const NativeCtx,
            x: c_int,
            y: c_int,
            z: c_int,
            out_rgba: *mut u8,
        ) -> c_int,
    >,
    pub run_face: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            ctx: *const NativeCtx,
            x: c_int,
            y: c_int,
            z: c_int,
            face_idx: c_int,
            out_rgba: *mut u8,
        ) -> c_int,
    >,
    pub run_image: Option<unsafe extern "C" fn(instance: *mut c_void, ctx: *const NativeCtx) -> c_int>,
    pub run_post: Option<unsafe extern "C" fn(instance: *mut c_void, ctx: *const NativeCtx) -> c_int>,
    /// 0 = auto, 1 = serial, N = preferred thread count.
    pub parallelism_hint: Option<unsafe extern "C" fn() -> c_int>,
}

/// Entry-point signature.
pub type EntryFn = unsafe extern "C" fn() -> *const NativeShaderV1;

fn flatten(m: &Matrix4<f32>) -> [f32; 16] {
    let cols: [[f32; 4]; 4] = (*m).into();
    let mut out = [0.0; 16];
    for (i, col) in cols.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(col);
    }
    out
}

impl NativeCtx {
    /// Build the C-side view of a frame. `output` is only set for hooks with
    /// surface access (IMAGE stage).
    pub fn from_frame(frame: &FrameContext, output: Option<&mut SurfaceBuffer>) -> Self {
        let render: &RenderContext = frame.render;
        let mut lights = [NativeLight {
            dir: [0.0; 3],
            intensity: 0.0,
            spec_power: 0.0,
        }; MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(render.lights.iter()) {
            *slot = NativeLight {
                dir: [light.direction.x, light.direction.y, light.direction.z],
                intensity: light.intensity,
                spec_power: light.specular_power,
            };
        }

        let (output_buffer, output_stride) = match output {
            Some(surface) => {
                let stride = surface.stride() as c_int;
                (surface.pixels_mut().as_mut_ptr(), stride)
            }
            None => (std::ptr::null_mut(), 0),
        };

        Self {
            model_mat: flatten(&render.model),
            view_mat: flatten(&render.view),
            proj_mat: flatten(&render.projection),
            q_view: [
                render.camera_rotation.v.x,
                render.camera_rotation.v.y,
                render.camera_rotation.v.z,
                render.camera_rotation.s,
            ],
            num_lights: render.lights.len() as c_int,
            lights,
            model: frame.model as *const VoxelModel as *const c_void,
            output_buffer,
            output_stride,
            time_sec: render.time_sec,
            width: render.width as c_int,
            height: render.height as c_int,
        }
    }
}
