//! Partition keys.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hash::Hash256;
use crate::schema::{col_index, ColMeta};
use crate::value::Value;

#[derive(Debug, PartialEq)]
struct KeyInner {
    cols: Vec<ColMeta>,
    values: Vec<Value>,
}

/// Ordered `(ColMeta, Value)` pairs identifying a partition. Cheap to clone.
#[derive(Clone, PartialEq)]
pub struct GroupKey {
    inner: Arc<KeyInner>,
}

impl GroupKey {
    pub fn new(cols: Vec<ColMeta>, values: Vec<Value>) -> Result<Self> {
        if cols.len() != values.len() {
            return Err(Error::Invalid(format!(
                "group key has {} columns but {} values",
                cols.len(),
                values.len()
            )));
        }
        for (i, (c, v)) in cols.iter().zip(&values).enumerate() {
            if !v.fits(c.ty) {
                return Err(Error::Invalid(format!(
                    "group key column \"{}\" is type {} but value is {}",
                    c.label, c.ty, v
                )));
            }
            if cols[..i].iter().any(|p| p.label == c.label) {
                return Err(Error::Invalid(format!(
                    "duplicate group key column \"{}\"",
                    c.label
                )));
            }
        }
        Ok(Self {
            inner: Arc::new(KeyInner { cols, values }),
        })
    }

    /// The key of an ungrouped stream.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(KeyInner {
                cols: Vec::new(),
                values: Vec::new(),
            }),
        }
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.inner.cols
    }

    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    pub fn len(&self) -> usize {
        self.inner.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cols.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        col_index(&self.inner.cols, label)
    }

    pub fn value_of(&self, label: &str) -> Result<&Value> {
        self.index_of(label)
            .map(|i| &self.inner.values[i])
            .ok_or_else(|| Error::NotFound(format!("group key has no column \"{label}\"")))
    }

    /// Same columns, new values (validated like `new`).
    pub fn with_values(&self, values: Vec<Value>) -> Result<Self> {
        Self::new(self.inner.cols.clone(), values)
    }

    pub fn hash_into(&self, h: &mut blake3::Hasher) {
        h.update(&(self.len() as u64).to_le_bytes());
        for (c, v) in self.inner.cols.iter().zip(&self.inner.values) {
            h.update(c.label.as_bytes());
            h.update(&[0]);
            h.update(c.ty.as_str().as_bytes());
            v.hash_into(h);
        }
    }

    /// Stable content hash.
    pub fn fingerprint(&self) -> Hash256 {
        let mut h = blake3::Hasher::new();
        self.hash_into(&mut h);
        Hash256(h.finalize().into())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (c, v)) in self.inner.cols.iter().zip(&self.inner.values).enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", c.label, v)?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupKey{self}")
    }
}
