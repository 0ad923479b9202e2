//! Scalar values: group key entries, row extraction, and literals in tests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::ColType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(i64),
}

impl Value {
    /// Column type of this value; `None` for null.
    pub fn col_type(&self) -> Option<ColType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ColType::Bool),
            Value::Int(_) => Some(ColType::Int),
            Value::UInt(_) => Some(ColType::UInt),
            Value::Float(_) => Some(ColType::Float),
            Value::String(_) => Some(ColType::String),
            Value::Time(_) => Some(ColType::Time),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value may be stored in a column of type `ty`.
    pub fn fits(&self, ty: ColType) -> bool {
        self.col_type().map_or(true, |t| t == ty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Feed a type-tagged encoding into a blake3 hasher.
    pub fn hash_into(&self, h: &mut blake3::Hasher) {
        match self {
            Value::Null => {
                h.update(&[0]);
            }
            Value::Bool(v) => {
                h.update(&[1, *v as u8]);
            }
            Value::Int(v) => {
                h.update(&[2]);
                h.update(&v.to_le_bytes());
            }
            Value::UInt(v) => {
                h.update(&[3]);
                h.update(&v.to_le_bytes());
            }
            Value::Float(v) => {
                h.update(&[4]);
                h.update(&v.to_bits().to_le_bytes());
            }
            Value::String(v) => {
                h.update(&[5]);
                h.update(&(v.len() as u64).to_le_bytes());
                h.update(v.as_bytes());
            }
            Value::Time(v) => {
                h.update(&[6]);
                h.update(&v.to_le_bytes());
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Time(v) => write!(f, "{v}ns"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
