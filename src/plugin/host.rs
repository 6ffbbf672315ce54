//! Discovery, loading and registration of native shader modules.
//!
//! The host scans a prioritized directory list for artifacts matching the
//! platform naming convention, verifies the entry symbol and interface
//! version, and registers one handle per module id (first match wins). A
//! bad artifact is skipped with a diagnostic; it never aborts discovery.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::error::{LoadError, ValidationError};
use crate::model::Rgba;
use crate::plugin::abi::{
    EntryFn, NativeCtx, NativeParamDef, NativeShaderV1, ARTIFACT_STEM, ENTRY_SYMBOL, HOOK_OK,
    HOOK_SKIP, NATIVE_T_BOOL, NATIVE_T_COLOR, NATIVE_T_FLOAT, NATIVE_T_INT, NATIVE_T_STRING,
    NATIVE_T_VEC3, PLUGIN_API_MAJOR,
};
use crate::shader::{HookError, HookResult, ParallelismHint, ParamDef, ParamType, ParamValue};

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Summary of a registered plugin, for listing/UI.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub path: String,
}

/// A verified, registered native module.
pub struct LoadedPlugin {
    pub info: PluginInfo,
    pub schema: Vec<ParamDef>,
    pub hint: ParallelismHint,
    vtable: *const NativeShaderV1,
    /// Keeps the dynamic library mapped for as long as any handle to this
    /// plugin is alive. `None` for statically registered tables.
    _library: Option<Library>,
}

// The vtable points into the loaded artifact, which stays mapped for the
// lifetime of this struct. The plugin contract requires its functions to be
// callable from any thread.
unsafe impl Send for LoadedPlugin {}
unsafe impl Sync for LoadedPlugin {}

impl LoadedPlugin {
    fn vtable(&self) -> &NativeShaderV1 {
        unsafe { &*self.vtable }
    }
}

/// Plugin registry and loader. Owns the only registry object; the engine
/// receives a shared handle at construction time. There is no global state.
pub struct PluginHost {
    search_dirs: Vec<PathBuf>,
    registry: RwLock<FxHashMap<String, Arc<LoadedPlugin>>>,
    /// Registration order, for stable listing.
    order: RwLock<Vec<String>>,
}

impl PluginHost {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            registry: RwLock::new(FxHashMap::default()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Append a directory with lower priority than all existing ones.
    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        self.search_dirs.push(dir.into());
    }

    /// Whether a file name matches the artifact naming convention:
    /// `<dll prefix>voxstack_shader_<name><dll suffix>`.
    pub fn is_artifact(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let prefix = format!("{}{}", std::env::consts::DLL_PREFIX, ARTIFACT_STEM);
        name.starts_with(&prefix)
            && name.ends_with(std::env::consts::DLL_SUFFIX)
            && name.len() > prefix.len() + std::env::consts::DLL_SUFFIX.len()
    }

    /// Scan all search directories in priority order. Returns the number of
    /// modules registered. Individual failures are logged and skipped.
    pub fn discover(&self) -> usize {
        let mut loaded = 0;
        for dir in &self.search_dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::debug!("plugin dir {} not readable: {}", dir.display(), e);
                    continue;
                }
            };
            let mut paths: Vec<PathBuf> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file() && Self::is_artifact(p))
                .collect();
            paths.sort();

            for path in paths {
                match self.load_artifact(&path) {
                    Ok(id) => {
                        log::info!("loaded shader module '{}' from {}", id, path.display());
                        loaded += 1;
                    }
                    Err(e) => {
                        log::warn!("skipping {}: {}", path.display(), e);
                    }
                }
            }
        }
        loaded
    }

    /// Load and register one artifact.
    pub fn load_artifact(&self, path: &Path) -> Result<String, PluginError> {
        let path_str = path.display().to_string();
        let library = unsafe {
            Library::new(path).map_err(|e| LoadError::Library {
                path: path_str.clone(),
                reason: e.to_string(),
            })?
        };

        let entry: EntryFn = unsafe {
            *library
                .get::<EntryFn>(ENTRY_SYMBOL)
                .map_err(|_| LoadError::MissingSymbol {
                    path: path_str.clone(),
                    symbol: "voxstack_shader_entry_v1",
                })?
        };

        let vtable = unsafe { entry() };
        if vtable.is_null() {
            return Err(LoadError::NullInterface { path: path_str }.into());
        }

        unsafe { self.register_vtable(vtable, &path_str, Some(library)) }
    }

    /// Register an in-process function table (static linking, tests).
    ///
    /// # Safety
    /// `vtable` must point to a valid `NativeShaderV1` that outlives the
    /// host and all instances created from it.
    pub unsafe fn register_static(
        &self,
        vtable: *const NativeShaderV1,
        origin: &str,
    ) -> Result<String, PluginError> {
        self.register_vtable(vtable, origin, None)
    }

    unsafe fn register_vtable(
        &self,
        vtable: *const NativeShaderV1,
        origin: &str,
        library: Option<Library>,
    ) -> Result<String, PluginError> {
        let table = &*vtable;

        let version = (table.api_version)();
        if version.major != PLUGIN_API_MAJOR {
            return Err(LoadError::VersionMismatch {
                path: origin.to_string(),
                got: version.major,
                got_minor: version.minor,
                expected: PLUGIN_API_MAJOR,
            }
            .into());
        }

        let id = read_cstr((table.shader_id)()).ok_or_else(|| LoadError::InvalidMetadata {
            path: origin.to_string(),
            reason: "null shader id".to_string(),
        })?;
        if id.is_empty() {
            return Err(LoadError::InvalidMetadata {
                path: origin.to_string(),
                reason: "empty shader id".to_string(),
            }
            .into());
        }

        let display_name = table
            .display_name
            .and_then(|f| read_cstr(f()))
            .unwrap_or_else(|| id.clone());

        let schema = read_schema(&id, table)?;
        crate::shader::validate_schema(&id, &schema)?;

        let hint = table
            .parallelism_hint
            .map(|f| ParallelismHint::from_code(f()))
            .unwrap_or(ParallelismHint::Serial);

        {
            let registry = self.registry.read();
            if let Some(existing) = registry.get(&id) {
                return Err(ValidationError::DuplicateId {
                    id,
                    kept: existing.info.path.clone(),
                }
                .into());
            }
        }

        let plugin = Arc::new(LoadedPlugin {
            info: PluginInfo {
                id: id.clone(),
                display_name,
                version: format!("{}.{}.{}", version.major, version.minor, version.patch),
                path: origin.to_string(),
            },
            schema,
            hint,
            vtable,
            _library: library,
        });

        self.registry.write().insert(id.clone(), plugin);
        self.order.write().push(id.clone());
        Ok(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.read().contains_key(id)
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        let registry = self.registry.read();
        self.order
            .read()
            .iter()
            .filter_map(|id| registry.get(id).map(|p| p.info.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// Create a module instance. The instance keeps the library mapped until
    /// it is dropped; its destroy hook always runs before the library can be
    /// released.
    pub fn create_instance(&self, id: &str) -> Result<NativeInstance, PluginError> {
        let plugin = self
            .registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownModule(id.to_string()))?;

        let instance = match plugin.vtable().create {
            Some(create) => {
                let ptr = unsafe { create() };
                if ptr.is_null() {
                    return Err(LoadError::CreateFailed {
                        path: plugin.info.path.clone(),
                    }
                    .into());
                }
                ptr
            }
            // Stateless module: hooks receive a null instance.
            None => std::ptr::null_mut(),
        };

        Ok(NativeInstance { plugin, instance })
    }

    /// Drop a module from the registry. Outstanding instances keep the
    /// library alive until they are destroyed.
    pub fn unload(&self, id: &str) -> bool {
        let removed = self.registry.write().remove(id).is_some();
        if removed {
            self.order.write().retain(|entry| entry != id);
            log::info!("unloaded shader module '{}'", id);
        }
        removed
    }

    /// Unload everything.
    pub fn shutdown(&self) {
        self.registry.write().clear();
        self.order.write().clear();
    }
}

fn read_cstr(ptr: *const std::os::raw::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { Some(CStr::from_ptr(ptr).to_string_lossy().into_owned()) }
}

unsafe fn read_schema(id: &str, table: &NativeShaderV1) -> Result<Vec<ParamDef>, LoadError> {
    let Some(params_schema) = table.params_schema else {
        return Ok(Vec::new());
    };
    let mut count: c_int = 0;
    let defs = params_schema(&mut count);
    if count < 0 || (count > 0 && defs.is_null()) {
        return Err(LoadError::InvalidMetadata {
            path: id.to_string(),
            reason: "schema query returned a null definition list".to_string(),
        });
    }

    let mut schema = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let def: &NativeParamDef = &*defs.add(i);
        schema.push(convert_param_def(id, def)?);
    }
    Ok(schema)
}

unsafe fn convert_param_def(id: &str, def: &NativeParamDef) -> Result<ParamDef, LoadError> {
    let bad = |reason: String| LoadError::InvalidMetadata {
        path: id.to_string(),
        reason,
    };

    let key = read_cstr(def.key).ok_or_else(|| bad("null parameter key".to_string()))?;
    if def.default_val.is_null() {
        return Err(bad(format!("null default for parameter {}", key)));
    }

    let (ty, default) = match def.ty {
        NATIVE_T_BOOL => (
            ParamType::Bool,
            ParamValue::Bool(*(def.default_val as *const c_int) != 0),
        ),
        NATIVE_T_INT => (
            ParamType::Int,
            ParamValue::Int(*(def.default_val as *const c_int)),
        ),
        NATIVE_T_FLOAT => (
            ParamType::Float,
            ParamValue::Float(*(def.default_val as *const f32)),
        ),
        NATIVE_T_VEC3 => (
            ParamType::Vec3,
            ParamValue::Vec3(*(def.default_val as *const [f32; 3])),
        ),
        NATIVE_T_COLOR => {
            let c = *(def.default_val as *const [f32; 4]);
            (
                ParamType::Color,
                ParamValue::Color(Rgba::new(
                    (c[0].clamp(0.0, 1.0) * 255.0) as u8,
                    (c[1].clamp(0.0, 1.0) * 255.0) as u8,
                    (c[2].clamp(0.0, 1.0) * 255.0) as u8,
                    (c[3].clamp(0.0, 1.0) * 255.0) as u8,
                )),
            )
        }
        NATIVE_T_STRING => {
            let s = read_cstr(def.default_val as *const std::os::raw::c_char)
                .ok_or_else(|| bad(format!("null string default for parameter {}", key)))?;
            (ParamType::String, ParamValue::String(s))
        }
        other => return Err(bad(format!("unknown parameter type tag {}", other))),
    };

    Ok(ParamDef {
        key,
        ty,
        default,
        display_name: read_cstr(def.display_name),
        tooltip: read_cstr(def.tooltip),
    })
}

/// A live instance of a native module. Dropping it calls the module's
/// destroy hook first, then (via the `Arc`) allows the library to unmap:
/// paired acquire/release with no partial teardown.
pub struct NativeInstance {
    plugin: Arc<LoadedPlugin>,
    instance: *mut c_void,
}

// The instance pointer is owned by this handle; the plugin contract requires
// hooks invoked concurrently (per the parallelism hint) to synchronize
// internally.
unsafe impl Send for NativeInstance {}
unsafe impl Sync for NativeInstance {}

impl Drop for NativeInstance {
    fn drop(&mut self) {
        if let Some(destroy) = self.plugin.vtable().destroy {
            unsafe { destroy(self.instance) };
        }
    }
}

fn map_code(code: c_int) -> HookResult<()> {
    match code {
        HOOK_OK => Ok(()),
        HOOK_SKIP => Err(HookError::Recoverable(format!("hook returned code {}", code))),
        other => Err(HookError::Fatal(format!("hook returned code {}", other))),
    }
}

impl NativeInstance {
    pub fn id(&self) -> &str {
        &self.plugin.info.id
    }

    pub fn display_name(&self) -> &str {
        &self.plugin.info.display_name
    }

    pub fn schema(&self) -> Vec<ParamDef> {
        self.plugin.schema.clone()
    }

    pub fn parallelism_hint(&self) -> ParallelismHint {
        self.plugin.hint
    }

    pub fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        let Some(set_param) = self.plugin.vtable().set_param else {
            return Err(ValidationError::BadParam {
                id: self.id().to_string(),
                key: key.to_string(),
                reason: "module accepts no parameters".to_string(),
            });
        };
        let c_key = CString::new(key).map_err(|_| ValidationError::BadParam {
            id: self.id().to_string(),
            key: key.to_string(),
            reason: "key contains NUL".to_string(),
        })?;

        // Marshal the value into its C representation.
        let code = unsafe {
            match value {
                ParamValue::Bool(b) => {
                    let v: c_int = *b as c_int;
                    set_param(self.instance, c_key.as_ptr(), &v as *const c_int as *const c_void)
                }
                ParamValue::Int(i) => {
                    set_param(self.instance, c_key.as_ptr(), i as *const i32 as *const c_void)
                }
                ParamValue::Float(f) => {
                    set_param(self.instance, c_key.as_ptr(), f as *const f32 as *const c_void)
                }
                ParamValue::Vec3(v) => {
                    set_param(self.instance, c_key.as_ptr(), v.as_ptr() as *const c_void)
                }
                ParamValue::Color(c) => {
                    let v = [
                        c.r as f32 / 255.0,
                        c.g as f32 / 255.0,
                        c.b as f32 / 255.0,
                        c.a as f32 / 255.0,
                    ];
                    set_param(self.instance, c_key.as_ptr(), v.as_ptr() as *const c_void)
                }
                ParamValue::String(s) => {
                    let c_val = CString::new(s.as_str()).map_err(|_| ValidationError::BadParam {
                        id: self.id().to_string(),
                        key: key.to_string(),
                        reason: "value contains NUL".to_string(),
                    })?;
                    set_param(self.instance, c_key.as_ptr(), c_val.as_ptr() as *const c_void)
                }
            }
        };

        if code != 0 {
            return Err(ValidationError::BadParam {
                id: self.id().to_string(),
                key: key.to_string(),
                reason: format!("set_param returned {}", code),
            });
        }
        Ok(())
    }

    pub fn pre(&self, ctx: &NativeCtx) -> Option<HookResult<()>> {
        let hook = self.plugin.vtable().run_pre?;
        Some(map_code(unsafe { hook(self.instance, ctx) }))
    }

    pub fn voxel(&self, ctx: &NativeCtx, x: i32, y: i32, z: i32, input: Rgba) -> Option<HookResult<Rgba>> {
        let hook = self.plugin.vtable().run_voxel?;
        let mut rgba = input.to_array();
        let code = unsafe { hook(self.instance, ctx, x, y, z, rgba.as_mut_ptr()) };
        Some(map_code(code).map(|_| Rgba::from_array(rgba)))
    }

    pub fn face(
        &self,
        ctx: &NativeCtx,
        x: i32,
        y: i32,
        z: i32,
        face_idx: i32,
        input: Rgba,
    ) -> Option<HookResult<Rgba>> {
        let hook = self.plugin.vtable().run_face?;
        let mut rgba = input.to_array();
        let code = unsafe { hook(self.instance, ctx, x, y, z, face_idx, rgba.as_mut_ptr()) };
        Some(map_code(code).map(|_| Rgba::from_array(rgba)))
    }

    pub fn image(&self, ctx: &NativeCtx) -> Option<HookResult<()>> {
        let hook = self.plugin.vtable().run_image?;
        Some(map_code(unsafe { hook(self.instance, ctx) }))
    }

    pub fn post(&self, ctx: &NativeCtx) -> Option<HookResult<()>> {
        let hook = self.plugin.vtable().run_post?;
        Some(map_code(unsafe { hook(self.instance, ctx) }))
    }

    pub fn has_pre(&self) -> bool {
        self.plugin.vtable().run_pre.is_some()
    }

    pub fn has_voxel(&self) -> bool {
        self.plugin.vtable().run_voxel.is_some()
    }

    pub fn has_face(&self) -> bool {
        self.plugin.vtable().run_face.is_some()
    }

    pub fn has_image(&self) -> bool {
        self.plugin.vtable().run_image.is_some()
    }

    pub fn has_post(&self) -> bool {
        self.plugin.vtable().run_post.is_some()
    }
}
