//! Fault isolation around module hook invocations.
//!
//! Every hook call crosses this boundary: panics are caught, failures are
//! recorded as diagnostics, and slow hooks are flagged. A misbehaving module
//! degrades its own output (input passes through unchanged) but never takes
//! the frame down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::shader::{HookError, HookResult, Stage};

/// Hard ceiling on primitives per frame.
pub const MAX_PRIMITIVES: usize = 1 << 20;

/// Default advisory threshold for a single hook invocation.
pub const SLOW_HOOK_WARN: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Recoverable failure or panic; module skipped for this frame.
    ExecutionFailure,
    /// Fatal failure; module disabled for the session.
    FatalFailure,
    /// Hook exceeded the advisory time threshold.
    PerformanceWarning,
}

/// One recorded incident, attributed to a module and stage.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub module_id: String,
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub detail: String,
    pub duration: Duration,
}

/// Outcome of a guarded invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeStatus {
    Completed,
    /// The module does not implement this hook.
    Unimplemented,
    /// Recoverable failure or panic; fallback value was substituted.
    Failed,
    /// Fatal failure; the module must be disabled for the session.
    Fatal,
}

/// Wraps hook invocations with panic isolation, timing, and diagnostics.
pub struct SafetyMonitor {
    slow_threshold: Duration,
    max_primitives: usize,
    diagnostics: Vec<Diagnostic>,
}

impl SafetyMonitor {
    pub fn new(slow_threshold: Duration, max_primitives: usize) -> Self {
        Self {
            slow_threshold,
            max_primitives,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whole-frame primitive ceiling check, done before any module runs.
    pub fn check_primitive_count(
        &self,
        count: usize,
    ) -> Result<(), crate::error::ExecutionError> {
        if count > self.max_primitives {
            return Err(crate::error::ExecutionError::PrimitiveCeiling {
                count,
                ceiling: self.max_primitives,
            });
        }
        Ok(())
    }

    /// Record an execution failure detected outside a hook invocation, such
    /// as output shape validation after a batch completes.
    pub fn record_failure(&mut self, module_id: &str, stage: Stage, detail: String) {
        log::warn!("module '{}' {} stage: {}", module_id, stage.name(), detail);
        self.diagnostics.push(Diagnostic {
            module_id: module_id.to_string(),
            stage,
            kind: DiagnosticKind::ExecutionFailure,
            detail,
            duration: Duration::ZERO,
        });
    }

    /// Runs one hook under the safety boundary. The closure returns what the
    /// hook returned (`None` = unimplemented); on panic or recoverable
    /// failure the `fallback` value is substituted.
    pub fn invoke<T>(
        &mut self,
        module_id: &str,
        stage: Stage,
        fallback: T,
        hook: impl FnOnce() -> Option<HookResult<T>>,
    ) -> (T, InvokeStatus) {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(hook));
        let elapsed = start.elapsed();

        if elapsed > self.slow_threshold {
            log::warn!(
                "module '{}' {} hook took {:?} (threshold {:?})",
                module_id,
                stage.name(),
                elapsed,
                self.slow_threshold
            );
            self.diagnostics.push(Diagnostic {
                module_id: module_id.to_string(),
                stage,
                kind: DiagnosticKind::PerformanceWarning,
                detail: format!("hook took {:?}", elapsed),
                duration: elapsed,
            });
        }

        match outcome {
            Ok(None) => (fallback, InvokeStatus::Unimplemented),
            Ok(Some(Ok(value))) => (value, InvokeStatus::Completed),
            Ok(Some(Err(HookError::Recoverable(detail)))) => {
                log::warn!(
                    "module '{}' {} hook failed: {}",
                    module_id,
                    stage.name(),
                    detail
                );
                self.diagnostics.push(Diagnostic {
                    module_id: module_id.to_string(),
                    stage,
                    kind: DiagnosticKind::ExecutionFailure,
                    detail,
                    duration: elapsed,
                });
                (fallback, InvokeStatus::Failed)
            }
            Ok(Some(Err(HookError::Fatal(detail)))) => {
                log::error!(
                    "module '{}' {} hook failed fatally, disabling for session: {}",
                    module_id,
                    stage.name(),
                    detail
                );
                self.diagnostics.push(Diagnostic {
                    module_id: module_id.to_string(),
                    stage,
                    kind: DiagnosticKind::FatalFailure,
                    detail,
                    duration: elapsed,
                });
                (fallback, InvokeStatus::Fatal)
            }
            Err(payload) => {
                let detail = panic_message(payload);
                log::error!(
                    "module '{}' {} hook panicked: {}",
                    module_id,
                    stage.name(),
                    detail
                );
                self.diagnostics.push(Diagnostic {
                    module_id: module_id.to_string(),
                    stage,
                    kind: DiagnosticKind::ExecutionFailure,
                    detail,
                    duration: elapsed,
                });
                (fallback, InvokeStatus::Failed)
            }
        }
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new(SLOW_HOOK_WARN, MAX_PRIMITIVES)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
