//! Aggregates: stateful transformations that reduce a whole partition to one
//! row, emitted when the partition ends.
//!
//! The output row holds the group key columns followed by one column per
//! aggregated input column, in the order the columns first appeared.

use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::{Chunk, ChunkBuilder};
use chunkflow_core::error::Result;
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::kernels::{target_indices, SchemaLock};
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

pub mod moments;
pub mod quantile;
pub mod sum;

/// Per-column reduction.
pub trait Accumulator: Send {
    fn update(&mut self, values: &Array);

    fn output_type(&self) -> ColType;

    /// The reduced value; called once per partition.
    fn value(&self) -> Value;
}

pub trait AggregateAlgorithm: Send + 'static {
    type Accumulator: Accumulator;

    fn name(&self) -> &'static str;

    fn columns(&self) -> &[String];

    /// Fresh accumulator for `col`, or an error if the type is unsupported.
    fn accumulator(&self, col: &ColMeta) -> Result<Self::Accumulator>;
}

pub struct AggregateState<C> {
    schema: SchemaLock,
    accumulators: Vec<(String, C)>,
    done: bool,
}

impl<C> AggregateState<C> {
    fn new() -> Self {
        Self {
            schema: SchemaLock::default(),
            accumulators: Vec::new(),
            done: false,
        }
    }
}

/// One row: key values followed by `extra` columns.
pub(crate) fn emit_row(
    key: &GroupKey,
    extra: Vec<(ColMeta, Value)>,
    d: &TransportDataset,
    alloc: &dyn Allocator,
) -> Result<()> {
    let mut cols = key.cols().to_vec();
    let mut row = key.values().to_vec();
    for (c, v) in extra {
        cols.push(c);
        row.push(v);
    }
    let mut b = ChunkBuilder::new(key.clone(), cols, alloc)?;
    b.resize(1)?;
    b.append_row(&row)?;
    d.process(b.finish()?)
}

impl<C: Accumulator> PartitionState for AggregateState<C> {
    fn finish(&mut self, key: &GroupKey, d: &TransportDataset, alloc: &dyn Allocator) -> Result<()> {
        if std::mem::replace(&mut self.done, true) {
            return Ok(());
        }
        let extra = std::mem::take(&mut self.accumulators)
            .into_iter()
            .map(|(label, acc)| (ColMeta::new(label, acc.output_type()), acc.value()))
            .collect();
        emit_row(key, extra, d, alloc)
    }
}

pub struct AggregateTransformation<A> {
    alg: A,
}

impl<A: AggregateAlgorithm> NarrowStateTransformation for AggregateTransformation<A> {
    type State = AggregateState<A::Accumulator>;

    fn name(&self) -> &'static str {
        self.alg.name()
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<Self::State>,
        _d: &TransportDataset,
        _alloc: &dyn Allocator,
    ) -> Result<(Self::State, bool)> {
        let mut st = state.unwrap_or_else(AggregateState::new);
        let targets = target_indices(&chunk, self.alg.columns());
        for &j in &targets {
            let col = chunk.col(j);
            st.schema.check(col)?;
            if !st.accumulators.iter().any(|(l, _)| *l == col.label) {
                let acc = self.alg.accumulator(col)?;
                st.accumulators.push((col.label.clone(), acc));
            }
        }
        for j in targets {
            let label = &chunk.col(j).label;
            if let Some((_, acc)) = st.accumulators.iter_mut().find(|(l, _)| l == label) {
                acc.update(chunk.values(j));
            }
        }
        Ok((st, false))
    }
}

pub(crate) fn new_aggregate_transformation<A: AggregateAlgorithm>(
    id: DatasetId,
    alg: A,
    alloc: Arc<dyn Allocator>,
) -> (Box<dyn Transformation>, TransportDataset) {
    new_narrow_state_transformation(id, AggregateTransformation { alg }, alloc)
}
