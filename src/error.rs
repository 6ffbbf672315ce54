//! Error taxonomy for the shading pipeline.
//!
//! Module-level failures (load, validation, execution) never cross the
//! safety boundary; only whole-frame failures are visible to the caller.

use thiserror::Error;

/// Errors while loading a native shader artifact. The artifact is skipped
/// and discovery continues.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load library {path}: {reason}")]
    Library { path: String, reason: String },

    #[error("missing entry symbol {symbol} in {path}")]
    MissingSymbol { path: String, symbol: &'static str },

    #[error("entry point returned a null interface in {path}")]
    NullInterface { path: String },

    #[error("API version mismatch in {path}: got {got}.{got_minor}, host supports {expected}.x")]
    VersionMismatch {
        path: String,
        got: i32,
        got_minor: i32,
        expected: i32,
    },

    #[error("malformed metadata in {path}: {reason}")]
    InvalidMetadata { path: String, reason: String },

    #[error("create hook returned null in {path}")]
    CreateFailed { path: String },
}

/// Errors while validating a module before registration. The module is not
/// registered; the host continues.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("module {id}: malformed parameter schema: {reason}")]
    BadSchema { id: String, reason: String },

    #[error("module {id}: missing required metadata: {what}")]
    MissingMetadata { id: String, what: &'static str },

    #[error("duplicate module id {id} (kept first match from {kept})")]
    DuplicateId { id: String, kept: String },

    #[error("unknown module id {0}")]
    UnknownModule(String),

    #[error("module {id}: parameter {key}: {reason}")]
    BadParam {
        id: String,
        key: String,
        reason: String,
    },
}

/// Runtime failures inside a module hook, caught at the invocation boundary.
/// The stack substitutes the module's input as its output and proceeds.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("hook panicked: {0}")]
    HookPanicked(String),

    #[error("hook failed with code {0}")]
    HookFailed(i32),

    #[error("hook failed fatally with code {0}; module disabled for session")]
    FatalHookFailure(i32),

    #[error("invalid input/output shape: {0}")]
    InvalidShape(String),

    #[error("primitive count {count} exceeds ceiling {ceiling}")]
    PrimitiveCeiling { count: usize, ceiling: usize },
}

/// Whole-frame failures caused by conditions outside any module. These are
/// the only errors a caller of the engine sees.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("voxel model is empty")]
    EmptyModel,

    #[error("target surface has zero area ({width}x{height})")]
    ZeroSurface { width: u32, height: u32 },

    #[error("surface dimensions {got_w}x{got_h} do not match render context {want_w}x{want_h}")]
    SurfaceMismatch {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
}
