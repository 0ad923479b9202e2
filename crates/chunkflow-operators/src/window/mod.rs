//! Windowed numeric algorithms.
//!
//! Most algorithms here are a per-column [`Estimator`] fed one value per row,
//! driven by [`WindowedTransformation`]. It owns the per-partition state:
//! priming, the schema lock, one estimator per target column and, while the
//! window is still filling, the last row seen (for the short-partition row).
//!
//! `cumulative_sum`, `derivative`, `difference` and `integral` keep
//! type-preserving or time-aware state and implement
//! [`NarrowStateTransformation`] directly. The time-aware ones share
//! [`TimeCursor`] for ordering checks.

use std::collections::HashMap;
use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::builder::FloatBuilder;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};

use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::kernels::{emit_replacing, Priming, SchemaLock};
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

pub mod chande_momentum_oscillator;
pub mod cumulative_sum;
pub mod derivative;
pub mod difference;
pub mod exponential;
pub mod integral;
pub mod kaufmans_ama;
pub mod moving_average;
pub mod relative_strength_index;
pub mod triple_exponential_derivative;

/// Incremental per-column computation.
pub trait Estimator: Send {
    /// Feed one row (`None` for null) and get that row's output.
    fn push(&mut self, v: Option<f64>) -> Option<f64>;

    /// Value for the single row emitted when a partition ends before the
    /// window filled. `None` means no such row.
    fn short_value(&self) -> Option<Option<f64>> {
        None
    }
}

pub trait WindowedAlgorithm: Send + 'static {
    type Estimator: Estimator;

    const NAME: &'static str;

    fn columns(&self) -> &[String];

    /// Rows consumed before the first output row.
    fn deficit(&self) -> usize;

    fn estimator(&self) -> Self::Estimator;

    /// Reject a target column this algorithm cannot take.
    fn check_column(&self, col: &ColMeta) -> Result<()> {
        if col.ty.is_numeric() {
            return Ok(());
        }
        Err(Error::FailedPrecondition(format!(
            "cannot take {} of column {} (type {})",
            Self::NAME.replace('_', " "),
            col.label,
            col.ty
        )))
    }

    /// Whether a configured column missing from a chunk is an error.
    fn require_columns(&self) -> bool {
        false
    }
}

pub struct WindowState<E> {
    priming: Priming,
    schema: SchemaLock,
    estimators: HashMap<String, E>,
    /// Last row while no output has been produced yet.
    last: Option<Chunk>,
}

impl<E: Estimator> WindowState<E> {
    fn new(deficit: usize) -> Self {
        Self {
            priming: Priming::new(deficit),
            schema: SchemaLock::default(),
            estimators: HashMap::new(),
            last: None,
        }
    }

    /// Whether a row was retained for the short-partition case.
    pub fn holds_last_row(&self) -> bool {
        self.last.is_some()
    }
}

impl<E: Estimator> PartitionState for WindowState<E> {
    fn finish(&mut self, _key: &GroupKey, d: &TransportDataset, alloc: &dyn Allocator) -> Result<()> {
        let Some(last) = self.last.take() else {
            return Ok(());
        };
        if self.priming.has_output() {
            return Ok(());
        }
        let mut replaced = Vec::new();
        let mut any = false;
        for (j, col) in last.cols().iter().enumerate() {
            let Some(est) = self.estimators.get(&col.label) else {
                continue;
            };
            let short = est.short_value();
            any |= short.is_some();
            let mut b = FloatBuilder::new(alloc)?;
            b.resize(1)?;
            b.append_option(short.flatten());
            replaced.push((j, b.finish()?));
        }
        if !any {
            return Ok(());
        }
        emit_replacing(&last, 0, replaced, d)?;
        Ok(())
    }
}

/// Adapts a [`WindowedAlgorithm`] to the stateful contract.
pub struct WindowedTransformation<A> {
    alg: A,
}

impl<A: WindowedAlgorithm> WindowedTransformation<A> {
    pub fn new(alg: A) -> Self {
        Self { alg }
    }
}

impl<A: WindowedAlgorithm> NarrowStateTransformation for WindowedTransformation<A> {
    type State = WindowState<A::Estimator>;

    fn name(&self) -> &'static str {
        A::NAME
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<Self::State>,
        d: &TransportDataset,
        alloc: &dyn Allocator,
    ) -> Result<(Self::State, bool)> {
        let mut st = state.unwrap_or_else(|| WindowState::new(self.alg.deficit()));

        // Validate every target before computing anything.
        let mut targets = Vec::new();
        for label in self.alg.columns() {
            match chunk.column_index(label) {
                Some(j) => {
                    let col = chunk.col(j);
                    self.alg.check_column(col)?;
                    st.schema.check(col)?;
                    targets.push(j);
                }
                None if self.alg.require_columns() => {
                    return Err(Error::FailedPrecondition(format!(
                        "cannot find {label} column"
                    )));
                }
                None => {}
            }
        }

        let len = chunk.len();
        let offset = st.priming.consume(len);
        let mut replaced: Vec<(usize, Array)> = Vec::with_capacity(targets.len());
        for j in targets {
            let label = &chunk.col(j).label;
            let est = st
                .estimators
                .entry(label.clone())
                .or_insert_with(|| self.alg.estimator());
            let values = chunk.values(j);
            let mut b = FloatBuilder::new(alloc)?;
            b.resize(len - offset)?;
            for i in 0..len {
                let out = est.push(values.f64_at(i));
                if i >= offset {
                    b.append_option(out);
                }
            }
            replaced.push((j, b.finish()?));
        }

        if st.priming.has_output() {
            st.last = None;
        } else if len > 0 {
            st.last = Some(chunk.slice(len - 1, 1));
        }

        let emitted = emit_replacing(&chunk, offset, replaced, d)?;
        Ok((st, emitted))
    }
}

/// Shared constructor body of every estimator-driven algorithm.
pub(crate) fn new_windowed_transformation<A: WindowedAlgorithm>(
    id: DatasetId,
    alg: A,
    alloc: Arc<dyn Allocator>,
) -> (Box<dyn Transformation>, TransportDataset) {
    new_narrow_state_transformation(id, WindowedTransformation::new(alg), alloc)
}

/// Fixed-capacity FIFO used by several estimators.
#[derive(Debug, Clone)]
pub(crate) struct Ring<T> {
    items: std::collections::VecDeque<T>,
    cap: usize,
}

impl<T> Ring<T> {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            items: std::collections::VecDeque::with_capacity(cap + 1),
            cap,
        }
    }

    /// Push `v`, evicting the oldest item once full.
    pub(crate) fn push(&mut self, v: T) -> Option<T> {
        self.items.push_back(v);
        if self.items.len() > self.cap {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub(crate) fn front(&self) -> Option<&T> {
        self.items.front()
    }
}

/// Index of the time column `label`, which must exist and be of time type.
pub(crate) fn time_column_index(chunk: &Chunk, label: &str) -> Result<usize> {
    let j = chunk
        .column_index(label)
        .ok_or_else(|| Error::FailedPrecondition(format!("no column \"{label}\" exists")))?;
    let ty = chunk.col(j).ty;
    if ty != ColType::Time {
        return Err(Error::FailedPrecondition(format!(
            "time column \"{label}\" is type {ty} and not time"
        )));
    }
    Ok(j)
}

/// Enforces non-decreasing time across every chunk of a partition.
#[derive(Debug, Clone, Default)]
pub(crate) struct TimeCursor {
    last: Option<i64>,
}

impl TimeCursor {
    /// Rows of `ts` that move time forward. A row repeating the latest instant
    /// is skipped; a null or earlier time fails the partition.
    pub(crate) fn advance(&mut self, op: &str, ts: &Array) -> Result<Vec<usize>> {
        if ts.null_count() > 0 {
            return Err(Error::FailedPrecondition(format!(
                "{op} found null time in time column"
            )));
        }
        let times = ts.times().unwrap_or_default();
        let mut kept = Vec::with_capacity(times.len());
        for (i, &t) in times.iter().enumerate() {
            match self.last {
                Some(last) if t < last => {
                    return Err(Error::FailedPrecondition(format!(
                        "{op} found out-of-order times in time column"
                    )))
                }
                Some(last) if t == last => continue,
                _ => {}
            }
            self.last = Some(t);
            kept.push(i);
        }
        Ok(kept)
    }
}
