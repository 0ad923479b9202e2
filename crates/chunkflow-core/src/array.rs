//! Immutable, reference-counted, typed nullable arrays.
//!
//! An `Array` is a window (`offset`, `len`) over a shared payload. Cloning an
//! array retains the payload, dropping it releases; the payload, and with it the
//! allocator guard accounting for its bytes, is freed on the last release.
//! Arrays are produced by the builders in [`crate::builder`] and never mutated
//! after that.

use std::fmt;
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::budget::{Allocator, BudgetGuard};
use crate::builder::ArrayBuilder;
use crate::error::Result;
use crate::schema::ColType;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Values {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    String(Vec<String>),
    Time(Vec<i64>),
}

impl Values {
    pub(crate) fn empty(ty: ColType) -> Self {
        match ty {
            ColType::Bool => Values::Bool(Vec::new()),
            ColType::Int => Values::Int(Vec::new()),
            ColType::UInt => Values::UInt(Vec::new()),
            ColType::Float => Values::Float(Vec::new()),
            ColType::String => Values::String(Vec::new()),
            ColType::Time => Values::Time(Vec::new()),
        }
    }
}

struct ArrayData {
    ty: ColType,
    values: Values,
    /// `None` when every slot is valid.
    validity: Option<Bitmap>,
    guard: Option<Box<dyn BudgetGuard>>,
}

#[derive(Clone)]
pub struct Array {
    data: Arc<ArrayData>,
    offset: usize,
    len: usize,
}

impl Array {
    pub(crate) fn from_parts(
        ty: ColType,
        values: Values,
        validity: Option<Bitmap>,
        guard: Option<Box<dyn BudgetGuard>>,
    ) -> Self {
        let len = match &values {
            Values::Bool(v) => v.len(),
            Values::Int(v) | Values::Time(v) => v.len(),
            Values::UInt(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::String(v) => v.len(),
        };
        Self {
            data: Arc::new(ArrayData {
                ty,
                values,
                validity,
                guard,
            }),
            offset: 0,
            len,
        }
    }

    /// Zero-length array of `ty`; owns no accounted memory.
    pub fn empty(ty: ColType) -> Self {
        Self::from_parts(ty, Values::empty(ty), None, None)
    }

    /// `n` nulls of type `ty`.
    pub fn nulls(ty: ColType, n: usize, alloc: &dyn Allocator) -> Result<Self> {
        let mut b = ArrayBuilder::new(ty, alloc)?;
        b.resize(n)?;
        for _ in 0..n {
            b.append_null();
        }
        b.finish()
    }

    pub fn ty(&self) -> ColType {
        self.data.ty
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_valid(&self, i: usize) -> bool {
        if i >= self.len {
            return false;
        }
        match &self.data.validity {
            None => true,
            Some(bits) => bits.get(self.offset + i),
        }
    }

    pub fn is_null(&self, i: usize) -> bool {
        !self.is_valid(i)
    }

    pub fn null_count(&self) -> usize {
        match &self.data.validity {
            None => 0,
            Some(bits) => self.len - bits.count_set(self.offset, self.len),
        }
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn bools(&self) -> Option<&[bool]> {
        match &self.data.values {
            Values::Bool(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    pub fn ints(&self) -> Option<&[i64]> {
        match &self.data.values {
            Values::Int(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    pub fn uints(&self) -> Option<&[u64]> {
        match &self.data.values {
            Values::UInt(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    pub fn floats(&self) -> Option<&[f64]> {
        match &self.data.values {
            Values::Float(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    pub fn strings(&self) -> Option<&[String]> {
        match &self.data.values {
            Values::String(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    /// Time values as int64 nanoseconds.
    pub fn times(&self) -> Option<&[i64]> {
        match &self.data.values {
            Values::Time(v) => Some(&v[self.range()]),
            _ => None,
        }
    }

    /// Row `i` as a scalar; null when invalid or out of bounds.
    pub fn value(&self, i: usize) -> Value {
        if !self.is_valid(i) {
            return Value::Null;
        }
        let at = self.offset + i;
        match &self.data.values {
            Values::Bool(v) => Value::Bool(v[at]),
            Values::Int(v) => Value::Int(v[at]),
            Values::UInt(v) => Value::UInt(v[at]),
            Values::Float(v) => Value::Float(v[at]),
            Values::String(v) => Value::String(v[at].clone()),
            Values::Time(v) => Value::Time(v[at]),
        }
    }

    /// Numeric row `i` widened to f64; `None` for nulls and non-numeric arrays.
    pub fn f64_at(&self, i: usize) -> Option<f64> {
        if !self.is_valid(i) {
            return None;
        }
        let at = self.offset + i;
        match &self.data.values {
            Values::Int(v) => Some(v[at] as f64),
            Values::UInt(v) => Some(v[at] as f64),
            Values::Float(v) => Some(v[at]),
            _ => None,
        }
    }

    /// Zero-copy window over this array. The range is clamped to the array bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Array {
        let offset = offset.min(self.len);
        let len = len.min(self.len - offset);
        Array {
            data: Arc::clone(&self.data),
            offset: self.offset + offset,
            len,
        }
    }

    /// Keep this buffer past the current call.
    pub fn retain(&self) -> Array {
        self.clone()
    }

    /// Give up a retained reference.
    pub fn release(self) {}

    /// Number of live references to the shared payload.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// Whether both arrays are views of the same payload.
    pub fn shares_buffer(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Bytes accounted with the allocator for the shared payload.
    pub fn accounted_bytes(&self) -> usize {
        self.data.guard.as_ref().map_or(0, |g| g.bytes())
    }

    pub(crate) fn hash_into(&self, h: &mut blake3::Hasher) {
        h.update(self.ty().as_str().as_bytes());
        h.update(&(self.len as u64).to_le_bytes());
        for i in 0..self.len {
            self.value(i).hash_into(h);
        }
    }
}

impl PartialEq for Array {
    /// Logical equality: same type, length, validity and values.
    fn eq(&self, other: &Self) -> bool {
        self.ty() == other.ty()
            && self.len == other.len
            && (0..self.len).all(|i| self.value(i) == other.value(i))
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<Value> = (0..self.len).map(|i| self.value(i)).collect();
        f.debug_struct("Array")
            .field("ty", &self.ty())
            .field("values", &values)
            .finish()
    }
}
