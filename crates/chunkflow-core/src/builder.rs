//! Two-phase array construction: append into a builder, then `finish()` into an
//! immutable [`Array`].
//!
//! Builders account their storage with the [`Allocator`] they were created
//! from. `resize(n)` reserves room for `n` values up front (and fails if the
//! budget refuses); `finish()` settles the guard at the exact payload size.

use crate::array::{Array, Values};
use crate::bitmap::Bitmap;
use crate::budget::{Allocator, BudgetGuard};
use crate::error::{Error, Result};
use crate::schema::ColType;
use crate::value::Value;

fn payload_bytes(ty: ColType, n: usize, extra: usize) -> usize {
    ty.value_width()
        .saturating_mul(n)
        .saturating_add(Bitmap::bytes_for(n))
        .saturating_add(extra)
}

fn grow(guard: &mut Box<dyn BudgetGuard>, bytes: usize) -> Result<()> {
    if bytes <= guard.bytes() || guard.try_resize(bytes) {
        return Ok(());
    }
    Err(Error::ResourceExhausted(format!(
        "memory budget exceeded for tag '{}': requested {} bytes",
        guard.tag(),
        bytes
    )))
}

/// Bytes a value owns outside the fixed-width slot.
trait HeapBytes {
    fn heap_bytes(&self) -> usize {
        0
    }
}

impl HeapBytes for bool {}
impl HeapBytes for i64 {}
impl HeapBytes for u64 {}
impl HeapBytes for f64 {}

impl HeapBytes for String {
    fn heap_bytes(&self) -> usize {
        self.len()
    }
}

macro_rules! primitive_builder {
    ($name:ident, $native:ty, $variant:ident, $tag:literal) => {
        pub struct $name {
            values: Vec<$native>,
            validity: Bitmap,
            nulls: usize,
            guard: Box<dyn BudgetGuard>,
        }

        impl $name {
            pub fn new(alloc: &dyn Allocator) -> Result<Self> {
                Ok(Self {
                    values: Vec::new(),
                    validity: Bitmap::new(),
                    nulls: 0,
                    guard: alloc.allocate(0, $tag)?,
                })
            }

            /// Reserve room for `n` values in total.
            pub fn resize(&mut self, n: usize) -> Result<()> {
                grow(&mut self.guard, payload_bytes(ColType::$variant, n, 0))?;
                self.values.reserve(n.saturating_sub(self.values.len()));
                self.validity.reserve(n.saturating_sub(self.validity.len()));
                Ok(())
            }

            pub fn append(&mut self, v: $native) {
                self.values.push(v);
                self.validity.push(true);
            }

            pub fn append_null(&mut self) {
                self.values.push(<$native>::default());
                self.validity.push(false);
                self.nulls += 1;
            }

            pub fn append_option(&mut self, v: Option<$native>) {
                match v {
                    Some(v) => self.append(v),
                    None => self.append_null(),
                }
            }

            pub fn len(&self) -> usize {
                self.values.len()
            }

            pub fn is_empty(&self) -> bool {
                self.values.is_empty()
            }

            fn extra_bytes(&self) -> usize {
                self.values.iter().map(HeapBytes::heap_bytes).sum()
            }

            /// Freeze into an immutable array.
            pub fn finish(mut self) -> Result<Array> {
                let bytes = payload_bytes(ColType::$variant, self.values.len(), self.extra_bytes());
                if !self.guard.try_resize(bytes) {
                    return Err(Error::ResourceExhausted(format!(
                        "memory budget exceeded for tag '{}': requested {} bytes",
                        self.guard.tag(),
                        bytes
                    )));
                }
                let validity = if self.nulls > 0 {
                    Some(self.validity)
                } else {
                    None
                };
                Ok(Array::from_parts(
                    ColType::$variant,
                    Values::$variant(self.values),
                    validity,
                    Some(self.guard),
                ))
            }
        }
    };
}

primitive_builder!(BoolBuilder, bool, Bool, "bool_builder");
primitive_builder!(IntBuilder, i64, Int, "int_builder");
primitive_builder!(UIntBuilder, u64, UInt, "uint_builder");
primitive_builder!(FloatBuilder, f64, Float, "float_builder");
primitive_builder!(StringBuilder, String, String, "string_builder");
primitive_builder!(TimeBuilder, i64, Time, "time_builder");

/// Builder for a column whose type is only known at run time.
pub enum ArrayBuilder {
    Bool(BoolBuilder),
    Int(IntBuilder),
    UInt(UIntBuilder),
    Float(FloatBuilder),
    String(StringBuilder),
    Time(TimeBuilder),
}

impl ArrayBuilder {
    pub fn new(ty: ColType, alloc: &dyn Allocator) -> Result<Self> {
        Ok(match ty {
            ColType::Bool => ArrayBuilder::Bool(BoolBuilder::new(alloc)?),
            ColType::Int => ArrayBuilder::Int(IntBuilder::new(alloc)?),
            ColType::UInt => ArrayBuilder::UInt(UIntBuilder::new(alloc)?),
            ColType::Float => ArrayBuilder::Float(FloatBuilder::new(alloc)?),
            ColType::String => ArrayBuilder::String(StringBuilder::new(alloc)?),
            ColType::Time => ArrayBuilder::Time(TimeBuilder::new(alloc)?),
        })
    }

    pub fn ty(&self) -> ColType {
        match self {
            ArrayBuilder::Bool(_) => ColType::Bool,
            ArrayBuilder::Int(_) => ColType::Int,
            ArrayBuilder::UInt(_) => ColType::UInt,
            ArrayBuilder::Float(_) => ColType::Float,
            ArrayBuilder::String(_) => ColType::String,
            ArrayBuilder::Time(_) => ColType::Time,
        }
    }

    pub fn resize(&mut self, n: usize) -> Result<()> {
        match self {
            ArrayBuilder::Bool(b) => b.resize(n),
            ArrayBuilder::Int(b) => b.resize(n),
            ArrayBuilder::UInt(b) => b.resize(n),
            ArrayBuilder::Float(b) => b.resize(n),
            ArrayBuilder::String(b) => b.resize(n),
            ArrayBuilder::Time(b) => b.resize(n),
        }
    }

    pub fn append_null(&mut self) {
        match self {
            ArrayBuilder::Bool(b) => b.append_null(),
            ArrayBuilder::Int(b) => b.append_null(),
            ArrayBuilder::UInt(b) => b.append_null(),
            ArrayBuilder::Float(b) => b.append_null(),
            ArrayBuilder::String(b) => b.append_null(),
            ArrayBuilder::Time(b) => b.append_null(),
        }
    }

    /// Append a scalar; its type must match the builder (nulls always fit).
    pub fn append_value(&mut self, v: &Value) -> Result<()> {
        match (self, v) {
            (b, Value::Null) => b.append_null(),
            (ArrayBuilder::Bool(b), Value::Bool(x)) => b.append(*x),
            (ArrayBuilder::Int(b), Value::Int(x)) => b.append(*x),
            (ArrayBuilder::UInt(b), Value::UInt(x)) => b.append(*x),
            (ArrayBuilder::Float(b), Value::Float(x)) => b.append(*x),
            (ArrayBuilder::String(b), Value::String(x)) => b.append(x.clone()),
            (ArrayBuilder::Time(b), Value::Time(x)) => b.append(*x),
            (b, other) => {
                return Err(Error::Invalid(format!(
                    "cannot append {} value to {} column",
                    other.col_type().map_or("null", |t| t.as_str()),
                    b.ty()
                )))
            }
        }
        Ok(())
    }

    /// Copy row `i` of `src`, which must have the builder's type.
    pub fn append_from(&mut self, src: &Array, i: usize) -> Result<()> {
        if src.ty() != self.ty() {
            return Err(Error::Invalid(format!(
                "cannot copy {} value into {} column",
                src.ty(),
                self.ty()
            )));
        }
        self.append_value(&src.value(i))
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayBuilder::Bool(b) => b.len(),
            ArrayBuilder::Int(b) => b.len(),
            ArrayBuilder::UInt(b) => b.len(),
            ArrayBuilder::Float(b) => b.len(),
            ArrayBuilder::String(b) => b.len(),
            ArrayBuilder::Time(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Result<Array> {
        match self {
            ArrayBuilder::Bool(b) => b.finish(),
            ArrayBuilder::Int(b) => b.finish(),
            ArrayBuilder::UInt(b) => b.finish(),
            ArrayBuilder::Float(b) => b.finish(),
            ArrayBuilder::String(b) => b.finish(),
            ArrayBuilder::Time(b) => b.finish(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_alloc {
    //! A plain counting allocator so core can test accounting without the mem crate.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::budget::{Allocator, BudgetGuard};
    use crate::error::{Error, Result};

    #[derive(Default)]
    pub struct Counting {
        pub cap: usize,
        pub used: Arc<AtomicUsize>,
    }

    struct Guard {
        used: Arc<AtomicUsize>,
        cap: usize,
        bytes: usize,
    }

    impl BudgetGuard for Guard {
        fn bytes(&self) -> usize {
            self.bytes
        }
        fn try_resize(&mut self, new_bytes: usize) -> bool {
            let cur = self.used.load(Ordering::SeqCst);
            if new_bytes > self.bytes && cur + (new_bytes - self.bytes) > self.cap {
                return false;
            }
            self.used.fetch_sub(self.bytes, Ordering::SeqCst);
            self.used.fetch_add(new_bytes, Ordering::SeqCst);
            self.bytes = new_bytes;
            true
        }
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            self.used.fetch_sub(self.bytes, Ordering::SeqCst);
        }
    }

    impl Allocator for Counting {
        fn allocate(&self, bytes: usize, _tag: &'static str) -> Result<Box<dyn BudgetGuard>> {
            let mut g = Guard {
                used: Arc::clone(&self.used),
                cap: self.cap,
                bytes: 0,
            };
            if !g.try_resize(bytes) {
                return Err(Error::ResourceExhausted("test cap".into()));
            }
            Ok(Box::new(g))
        }
        fn capacity_bytes(&self) -> usize {
            self.cap
        }
        fn used_bytes(&self) -> usize {
            self.used.load(Ordering::SeqCst)
        }
    }

    pub fn with_cap(cap: usize) -> Counting {
        Counting {
            cap,
            used: Arc::new(AtomicUsize::new(0)),
        }
    }
}
