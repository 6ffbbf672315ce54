//! Module parameter schema and values.
//!
//! A module declares its schema once; the stack configuration supplies
//! values by key. Types are semantic, not structural: a Color is not a Vec3.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::Rgba;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Vec3,
    Color,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Color(Rgba),
    String(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Vec3(_) => ParamType::Vec3,
            ParamValue::Color(_) => ParamType::Color,
            ParamValue::String(_) => ParamType::String,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            ParamValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// One schema entry: key, semantic type, default, optional display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub key: String,
    pub ty: ParamType,
    pub default: ParamValue,
    pub display_name: Option<String>,
    pub tooltip: Option<String>,
}

impl ParamDef {
    pub fn new(key: &str, default: ParamValue) -> Self {
        Self {
            key: key.to_string(),
            ty: default.param_type(),
            default,
            display_name: None,
            tooltip: None,
        }
    }

    pub fn with_display(mut self, name: &str, tooltip: &str) -> Self {
        self.display_name = Some(name.to_string());
        self.tooltip = Some(tooltip.to_string());
        self
    }
}

/// Validate a declared schema: non-empty unique keys, default values that
/// match their declared type.
pub fn validate_schema(module_id: &str, schema: &[ParamDef]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for def in schema {
        if def.key.is_empty() {
            return Err(ValidationError::BadSchema {
                id: module_id.to_string(),
                reason: "empty parameter key".to_string(),
            });
        }
        if !seen.insert(def.key.as_str()) {
            return Err(ValidationError::BadSchema {
                id: module_id.to_string(),
                reason: format!("duplicate parameter key {}", def.key),
            });
        }
        if def.default.param_type() != def.ty {
            return Err(ValidationError::BadSchema {
                id: module_id.to_string(),
                reason: format!("default for {} does not match declared type", def.key),
            });
        }
    }
    Ok(())
}
