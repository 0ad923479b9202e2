//! Column types and column metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_VALUE_LABEL: &str = "_value";
pub const DEFAULT_TIME_LABEL: &str = "_time";
pub const DEFAULT_START_LABEL: &str = "_start";
pub const DEFAULT_STOP_LABEL: &str = "_stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColType {
    Bool,
    Int,
    UInt,
    Float,
    String,
    /// Nanoseconds since the Unix epoch, stored as i64.
    Time,
}

impl ColType {
    /// Int, UInt and Float.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColType::Int | ColType::UInt | ColType::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColType::Bool => "bool",
            ColType::Int => "int",
            ColType::UInt => "uint",
            ColType::Float => "float",
            ColType::String => "string",
            ColType::Time => "time",
        }
    }

    /// Width in bytes of one fixed-size value (strings count their pointer).
    pub fn value_width(self) -> usize {
        match self {
            ColType::Bool => 1,
            ColType::Int | ColType::UInt | ColType::Float | ColType::Time => 8,
            ColType::String => std::mem::size_of::<String>(),
        }
    }
}

impl fmt::Display for ColType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColMeta {
    pub label: String,
    #[serde(rename = "type")]
    pub ty: ColType,
}

impl ColMeta {
    pub fn new(label: impl Into<String>, ty: ColType) -> Self {
        Self {
            label: label.into(),
            ty,
        }
    }

    /// Same label, different type.
    pub fn with_type(&self, ty: ColType) -> Self {
        Self {
            label: self.label.clone(),
            ty,
        }
    }
}

/// Index of `label` within `cols`.
pub fn col_index(cols: &[ColMeta], label: &str) -> Option<usize> {
    cols.iter().position(|c| c.label == label)
}
