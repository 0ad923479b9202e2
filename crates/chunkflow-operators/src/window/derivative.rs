//! Rate of change per unit of time against the previous valid value.
//!
//! Times must be non-decreasing across the whole partition. Rows sharing an
//! instant with an earlier row are dropped before anything else looks at them,
//! and the first remaining row of the partition only seeds the state.

use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::builder::{ArrayBuilder, FloatBuilder};
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{col_index, ColMeta, ColType};

use super::{time_column_index, TimeCursor};
use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::plan::DerivativeSpec;
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

/// A previous value kept at full precision.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Num {
    fn at(values: &Array, i: usize) -> Option<Num> {
        if !values.is_valid(i) {
            return None;
        }
        match values.ty() {
            ColType::Int => values.ints().map(|v| Num::Int(v[i])),
            ColType::UInt => values.uints().map(|v| Num::UInt(v[i])),
            ColType::Float => values.floats().map(|v| Num::Float(v[i])),
            _ => None,
        }
    }

    /// `self - prev`; integers are widened so unsigned drops stay negative.
    fn delta(self, prev: Num) -> f64 {
        match (self, prev) {
            (Num::Float(a), Num::Float(b)) => a - b,
            (a, b) => (a.wide() - b.wide()) as f64,
        }
    }

    fn wide(self) -> i128 {
        match self {
            Num::Int(v) => i128::from(v),
            Num::UInt(v) => i128::from(v),
            Num::Float(v) => v as i128,
        }
    }

    fn is_below(self, prev: Num) -> bool {
        self.delta(prev) < 0.0
    }

    fn zero_like(self) -> Num {
        match self {
            Num::Int(_) => Num::Int(0),
            Num::UInt(_) => Num::UInt(0),
            Num::Float(_) => Num::Float(0.0),
        }
    }
}

#[derive(Debug, Clone)]
struct NumericColumn {
    initialized: bool,
    pv: Option<Num>,
    pt: i64,
}

#[derive(Debug, Clone)]
enum ColumnKind {
    Passthrough { initialized: bool },
    Numeric(NumericColumn),
}

#[derive(Debug, Clone)]
struct ColumnState {
    input: ColType,
    kind: ColumnKind,
}

pub struct DerivativeState {
    /// Output schema of the partition; grows when new columns show up.
    cols: Vec<ColMeta>,
    data: Vec<ColumnState>,
    cursor: TimeCursor,
    initialized: bool,
}

impl PartitionState for DerivativeState {}

pub struct Derivative {
    unit: f64,
    non_negative: bool,
    initial_zero: bool,
    columns: Vec<String>,
    time_column: String,
}

impl Derivative {
    fn column_state(&self, col: &ColMeta, initialized: bool) -> Result<(ColMeta, ColumnState)> {
        if !self.columns.iter().any(|c| *c == col.label) {
            let state = ColumnState {
                input: col.ty,
                kind: ColumnKind::Passthrough { initialized },
            };
            return Ok((col.clone(), state));
        }
        if !col.ty.is_numeric() {
            return Err(Error::FailedPrecondition(format!(
                "unsupported derivative column type {}:{}",
                col.label, col.ty
            )));
        }
        let state = ColumnState {
            input: col.ty,
            kind: ColumnKind::Numeric(NumericColumn {
                initialized,
                pv: None,
                pt: 0,
            }),
        };
        Ok((col.with_type(ColType::Float), state))
    }

    fn reconcile(&self, chunk: &Chunk, state: &mut DerivativeState) -> Result<()> {
        for col in chunk.cols() {
            match col_index(&state.cols, &col.label) {
                Some(k) => {
                    let was = state.data[k].input;
                    if was != col.ty {
                        return Err(Error::schema_collision(&col.label, was, col.ty));
                    }
                }
                None => {
                    let (meta, data) = self.column_state(col, state.initialized)?;
                    state.cols.push(meta);
                    state.data.push(data);
                }
            }
        }
        Ok(())
    }

    fn numeric(
        &self,
        col: &mut NumericColumn,
        times: &[i64],
        values: &Array,
        rows: &[usize],
        alloc: &dyn Allocator,
    ) -> Result<Array> {
        let mut b = FloatBuilder::new(alloc)?;
        b.resize(rows.len())?;
        for &i in rows {
            let t = times[i];
            let v = Num::at(values, i);
            if !col.initialized {
                col.initialized = true;
                col.pt = t;
                col.pv = v;
                continue;
            }
            let Some(cv) = v else {
                b.append_null();
                continue;
            };
            let Some(mut pv) = col.pv else {
                col.pv = Some(cv);
                col.pt = t;
                b.append_null();
                continue;
            };
            let elapsed = (i128::from(t) - i128::from(col.pt)) as f64 / self.unit;
            if self.non_negative && cv.is_below(pv) {
                if !self.initial_zero {
                    col.pv = Some(cv);
                    col.pt = t;
                    b.append_null();
                    continue;
                }
                pv = cv.zero_like();
            }
            b.append(cv.delta(pv) / elapsed);
            col.pv = Some(cv);
            col.pt = t;
        }
        b.finish()
    }
}

fn passthrough(
    initialized: &mut bool,
    values: &Array,
    rows: Option<&[usize]>,
    alloc: &dyn Allocator,
) -> Result<Array> {
    let total = rows.map_or(values.len(), <[usize]>::len);
    let skip = usize::from(!*initialized && total > 0);
    if total > 0 {
        *initialized = true;
    }
    match rows {
        None => Ok(values.slice(skip, total - skip)),
        Some(rows) => {
            let mut b = ArrayBuilder::new(values.ty(), alloc)?;
            b.resize(total - skip)?;
            for &i in &rows[skip..] {
                b.append_from(values, i)?;
            }
            b.finish()
        }
    }
}

impl NarrowStateTransformation for Derivative {
    type State = DerivativeState;

    fn name(&self) -> &'static str {
        "derivative"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<DerivativeState>,
        d: &TransportDataset,
        alloc: &dyn Allocator,
    ) -> Result<(DerivativeState, bool)> {
        let time_idx = time_column_index(&chunk, &self.time_column)?;

        let mut st = state.unwrap_or_else(|| DerivativeState {
            cols: Vec::with_capacity(chunk.num_cols()),
            data: Vec::with_capacity(chunk.num_cols()),
            cursor: TimeCursor::default(),
            initialized: false,
        });
        self.reconcile(&chunk, &mut st)?;

        let ts = chunk.times(time_idx)?;
        let kept = st.cursor.advance("derivative", ts)?;
        // `None` when every row advances time.
        let mask = (kept.len() < chunk.len()).then_some(kept);
        let times = ts.times().unwrap_or_default();
        let all_rows: Vec<usize>;
        let rows: &[usize] = match &mask {
            Some(kept) => kept,
            None => {
                all_rows = (0..chunk.len()).collect();
                &all_rows
            }
        };

        let mut buffers = Vec::with_capacity(st.cols.len());
        for (meta, data) in st.cols.iter().zip(st.data.iter_mut()) {
            let values = match chunk.column_index(&meta.label) {
                Some(j) => chunk.values(j).clone(),
                None => Array::nulls(data.input, chunk.len(), alloc)?,
            };
            let out = match &mut data.kind {
                ColumnKind::Passthrough { initialized } => {
                    passthrough(initialized, &values, mask.as_deref(), alloc)?
                }
                ColumnKind::Numeric(col) => self.numeric(col, times, &values, rows, alloc)?,
            };
            buffers.push(out);
        }

        if !chunk.is_empty() {
            st.initialized = true;
        }

        let out = Chunk::new(chunk.key().clone(), st.cols.clone(), buffers)?;
        let emitted = !out.is_empty() || chunk.is_empty();
        if emitted {
            d.process(out)?;
        }
        Ok((st, emitted))
    }
}

pub fn new_derivative_transformation(
    id: DatasetId,
    spec: &DerivativeSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    spec.validate()?;
    let t = Derivative {
        unit: spec.unit as f64,
        non_negative: spec.non_negative,
        initial_zero: spec.initial_zero,
        columns: spec.columns.clone(),
        time_column: spec.time_column.clone(),
    };
    Ok(new_narrow_state_transformation(id, t, alloc))
}
