//! Declarative shader stack configuration.
//!
//! A stack config is an ordered list of entries naming modules by
//! identifier, with per-entry parameters and input routing. Configs are
//! plain data (serde round-trippable) and are resolved into an executable
//! stack by the engine.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::shader::ParamValue;

/// Where a FACE-stage module takes its input color from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRouting {
    /// The face's base color, ignoring earlier modules.
    BaseColor,
    /// The previous enabled module's output (chaining).
    #[default]
    PreviousOutput,
    /// A color encoding the face's geometry (dominant-direction normal
    /// mapped into RGB).
    Geometry,
}

/// One module slot in a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackEntry {
    pub module_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: FxHashMap<String, ParamValue>,
    #[serde(default)]
    pub input: InputRouting,
}

fn default_enabled() -> bool {
    true
}

impl StackEntry {
    pub fn new(module_id: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            enabled: true,
            params: FxHashMap::default(),
            input: InputRouting::default(),
        }
    }

    pub fn with_param(mut self, key: &str, value: ParamValue) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_input(mut self, input: InputRouting) -> Self {
        self.input = input;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// An ordered module list. Order is execution order within each stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaderStackConfig {
    pub entries: Vec<StackEntry>,
}

impl ShaderStackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: StackEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    /// Entries that will actually execute.
    pub fn enabled_entries(&self) -> impl Iterator<Item = &StackEntry> {
        self.entries.iter().filter(|e| e.enabled)
    }
}
