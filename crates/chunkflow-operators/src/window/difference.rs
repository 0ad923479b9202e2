//! Row-to-row difference against the previous valid value.
//!
//! int and uint inputs produce int (uint via two's complement), float stays
//! float. The first row of the partition is dropped unless `keep_first`.

use std::collections::HashMap;
use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::builder::{FloatBuilder, IntBuilder};
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};

use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::kernels::{emit_replacing, target_indices, SchemaLock};
use crate::plan::DifferenceSpec;
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

#[derive(Debug, Clone, Copy)]
struct Options {
    non_negative: bool,
    keep_first: bool,
    initial_zero: bool,
}

/// Previous value of one column.
#[derive(Debug, Clone, Copy, Default)]
struct Prev<T> {
    value: T,
    valid: bool,
}

impl Prev<i64> {
    fn update(&mut self, v: i64, o: Options) -> Option<i64> {
        let prev = std::mem::replace(&mut self.value, v);
        if !std::mem::replace(&mut self.valid, true) {
            return (o.keep_first && o.initial_zero).then_some(0);
        }
        let diff = v.wrapping_sub(prev);
        if diff >= 0 || !o.non_negative {
            Some(diff)
        } else {
            (o.initial_zero && v >= 0).then_some(v)
        }
    }
}

impl Prev<u64> {
    fn update(&mut self, v: u64, o: Options) -> Option<i64> {
        let prev = std::mem::replace(&mut self.value, v);
        if !std::mem::replace(&mut self.valid, true) {
            return (o.keep_first && o.initial_zero).then_some(0);
        }
        let diff = v.wrapping_sub(prev) as i64;
        if diff >= 0 || !o.non_negative {
            Some(diff)
        } else {
            let v = v as i64;
            (o.initial_zero && v >= 0).then_some(v)
        }
    }
}

impl Prev<f64> {
    fn update(&mut self, v: f64, o: Options) -> Option<f64> {
        let prev = std::mem::replace(&mut self.value, v);
        if !std::mem::replace(&mut self.valid, true) {
            return (o.keep_first && o.initial_zero).then_some(0.0);
        }
        let diff = v - prev;
        if diff >= 0.0 || !o.non_negative {
            Some(diff)
        } else {
            (o.initial_zero && v >= 0.0).then_some(v)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ColumnDiff {
    Int(Prev<i64>),
    UInt(Prev<u64>),
    Float(Prev<f64>),
}

impl ColumnDiff {
    fn for_column(col: &ColMeta) -> Result<Self> {
        match col.ty {
            ColType::Int => Ok(ColumnDiff::Int(Prev::default())),
            ColType::UInt => Ok(ColumnDiff::UInt(Prev::default())),
            ColType::Float => Ok(ColumnDiff::Float(Prev::default())),
            ColType::Time => Err(Error::FailedPrecondition(
                "difference does not support time columns".into(),
            )),
            other => Err(Error::Invalid(format!(
                "difference does not support column \"{}\" of type \"{other}\"",
                col.label
            ))),
        }
    }

    /// Runs every row through the state; rows before `offset` are not emitted.
    fn apply(
        &mut self,
        values: &Array,
        offset: usize,
        o: Options,
        alloc: &dyn Allocator,
    ) -> Result<Array> {
        let len = values.len();
        let out_len = len.saturating_sub(offset);
        match self {
            ColumnDiff::Int(p) => {
                let src = values.ints().unwrap_or_default();
                let mut b = IntBuilder::new(alloc)?;
                b.resize(out_len)?;
                for (i, &v) in src.iter().enumerate() {
                    let out = if values.is_valid(i) { p.update(v, o) } else { None };
                    if i >= offset {
                        b.append_option(out);
                    }
                }
                b.finish()
            }
            ColumnDiff::UInt(p) => {
                let src = values.uints().unwrap_or_default();
                let mut b = IntBuilder::new(alloc)?;
                b.resize(out_len)?;
                for (i, &v) in src.iter().enumerate() {
                    let out = if values.is_valid(i) { p.update(v, o) } else { None };
                    if i >= offset {
                        b.append_option(out);
                    }
                }
                b.finish()
            }
            ColumnDiff::Float(p) => {
                let src = values.floats().unwrap_or_default();
                let mut b = FloatBuilder::new(alloc)?;
                b.resize(out_len)?;
                for (i, &v) in src.iter().enumerate() {
                    let out = if values.is_valid(i) { p.update(v, o) } else { None };
                    if i >= offset {
                        b.append_option(out);
                    }
                }
                b.finish()
            }
        }
    }
}

pub struct DifferenceState {
    schema: SchemaLock,
    columns: HashMap<String, ColumnDiff>,
    drop_first: bool,
}

impl PartitionState for DifferenceState {}

pub struct Difference {
    columns: Vec<String>,
    options: Options,
}

impl NarrowStateTransformation for Difference {
    type State = DifferenceState;

    fn name(&self) -> &'static str {
        "difference"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<DifferenceState>,
        d: &TransportDataset,
        alloc: &dyn Allocator,
    ) -> Result<(DifferenceState, bool)> {
        let mut st = state.unwrap_or_else(|| DifferenceState {
            schema: SchemaLock::default(),
            columns: HashMap::new(),
            drop_first: !self.options.keep_first,
        });
        let targets = target_indices(&chunk, &self.columns);
        for &j in &targets {
            let col = chunk.col(j);
            st.schema.check(col)?;
            if !st.columns.contains_key(&col.label) {
                st.columns.insert(col.label.clone(), ColumnDiff::for_column(col)?);
            }
        }

        let offset = usize::from(st.drop_first && !chunk.is_empty());
        if !chunk.is_empty() {
            st.drop_first = false;
        }
        let mut replaced = Vec::with_capacity(targets.len());
        for j in targets {
            let label = &chunk.col(j).label;
            let diff = st
                .columns
                .get_mut(label)
                .ok_or_else(|| Error::Internal(format!("no difference state for {label}")))?;
            replaced.push((j, diff.apply(chunk.values(j), offset, self.options, alloc)?));
        }
        let emitted = emit_replacing(&chunk, offset, replaced, d)?;
        Ok((st, emitted))
    }
}

pub fn new_difference_transformation(
    id: DatasetId,
    spec: &DifferenceSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let t = Difference {
        columns: spec.columns.clone(),
        options: Options {
            non_negative: spec.non_negative,
            keep_first: spec.keep_first,
            initial_zero: spec.initial_zero,
        },
    };
    Ok(new_narrow_state_transformation(id, t, alloc))
}
