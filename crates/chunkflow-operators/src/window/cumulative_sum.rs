//! Running totals per target column, type preserving.

use std::collections::HashMap;
use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::builder::{FloatBuilder, IntBuilder, UIntBuilder};
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};

use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::kernels::{emit_replacing, target_indices, SchemaLock};
use crate::plan::CumulativeSumSpec;
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Total {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Total {
    fn zero(col: &ColMeta) -> Result<Self> {
        match col.ty {
            ColType::Int => Ok(Total::Int(0)),
            ColType::UInt => Ok(Total::UInt(0)),
            ColType::Float => Ok(Total::Float(0.0)),
            other => Err(Error::Unimplemented(format!(
                "cumulative sum of column {} with type {other} is not supported",
                col.label
            ))),
        }
    }
}

#[derive(Default)]
pub struct CumulativeSumState {
    schema: SchemaLock,
    totals: HashMap<String, Total>,
}

impl PartitionState for CumulativeSumState {}

pub struct CumulativeSum {
    columns: Vec<String>,
}

fn overflow(label: &str) -> Error {
    Error::OutOfRange(format!("cumulative sum overflowed in column {label}"))
}

fn accumulate(total: &mut Total, label: &str, values: &Array, alloc: &dyn Allocator) -> Result<Array> {
    let len = values.len();
    match total {
        Total::Int(acc) => {
            let src = values.ints().unwrap_or_default();
            let mut b = IntBuilder::new(alloc)?;
            b.resize(len)?;
            for (i, &v) in src.iter().enumerate() {
                if values.is_valid(i) {
                    *acc = acc.checked_add(v).ok_or_else(|| overflow(label))?;
                    b.append(*acc);
                } else {
                    b.append_null();
                }
            }
            b.finish()
        }
        Total::UInt(acc) => {
            let src = values.uints().unwrap_or_default();
            let mut b = UIntBuilder::new(alloc)?;
            b.resize(len)?;
            for (i, &v) in src.iter().enumerate() {
                if values.is_valid(i) {
                    *acc = acc.checked_add(v).ok_or_else(|| overflow(label))?;
                    b.append(*acc);
                } else {
                    b.append_null();
                }
            }
            b.finish()
        }
        Total::Float(acc) => {
            let src = values.floats().unwrap_or_default();
            let mut b = FloatBuilder::new(alloc)?;
            b.resize(len)?;
            for (i, &v) in src.iter().enumerate() {
                if values.is_valid(i) {
                    *acc += v;
                    b.append(*acc);
                } else {
                    b.append_null();
                }
            }
            b.finish()
        }
    }
}

impl NarrowStateTransformation for CumulativeSum {
    type State = CumulativeSumState;

    fn name(&self) -> &'static str {
        "cumulative_sum"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<CumulativeSumState>,
        d: &TransportDataset,
        alloc: &dyn Allocator,
    ) -> Result<(CumulativeSumState, bool)> {
        let mut st = state.unwrap_or_default();
        let targets = target_indices(&chunk, &self.columns);
        for &j in &targets {
            let col = chunk.col(j);
            st.schema.check(col)?;
            if !st.totals.contains_key(&col.label) {
                let zero = Total::zero(col)?;
                st.totals.insert(col.label.clone(), zero);
            }
        }

        let mut replaced = Vec::with_capacity(targets.len());
        for j in targets {
            let label = &chunk.col(j).label;
            let total = st
                .totals
                .get_mut(label)
                .ok_or_else(|| Error::Internal(format!("no running total for {label}")))?;
            replaced.push((j, accumulate(total, label, chunk.values(j), alloc)?));
        }
        let emitted = emit_replacing(&chunk, 0, replaced, d)?;
        Ok((st, emitted))
    }
}

pub fn new_cumulative_sum_transformation(
    id: DatasetId,
    spec: &CumulativeSumSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let t = CumulativeSum {
        columns: spec.columns.clone(),
    };
    Ok(new_narrow_state_transformation(id, t, alloc))
}
