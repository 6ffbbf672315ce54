//! The composable shader stack: configuration, safety boundary, engine.

pub mod config;
pub mod engine;
pub mod safety;

pub use config::{InputRouting, ShaderStackConfig, StackEntry};
pub use engine::{BoundModule, FrameOutput, SafetyLimits, ShaderStack, ShaderStackEngine};
pub use safety::{
    Diagnostic, DiagnosticKind, InvokeStatus, SafetyMonitor, MAX_PRIMITIVES, SLOW_HOOK_WARN,
};
