//! `quantile`: t-digest estimate, exact interpolated mean, or exact selector.
//!
//! The selector returns a whole input row rather than a computed value, so it
//! retains the partition's chunks until the partition ends.

use std::cmp::Ordering;
use std::sync::Arc;

use tdigest::TDigest;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use super::{new_aggregate_transformation, Accumulator, AggregateAlgorithm};
use crate::adapter::new_narrow_state_transformation;
use crate::dataset::TransportDataset;
use crate::kernels::SchemaLock;
use crate::plan::{QuantileMethod, QuantileSpec};
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

fn valid_floats(values: &Array) -> Vec<f64> {
    (0..values.len()).filter_map(|i| values.f64_at(i)).collect()
}

#[derive(Debug, Clone)]
pub enum QuantileAcc {
    Estimate { digest: TDigest, q: f64 },
    ExactMean { values: Vec<f64>, q: f64 },
}

/// Linear interpolation between the two closest ranks of sorted `values`.
pub fn exact_mean(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let x = q * (values.len() - 1) as f64;
    let (x0, x1) = (x.floor(), x.ceil());
    let (y0, y1) = (values[x0 as usize], values[x1 as usize]);
    if x0 == x1 {
        return Some(y0);
    }
    // Weighted form; `y0 + t * (y1 - y0)` is NaN for an infinite `y0`.
    Some(y0 * (x1 - x) + y1 * (x - x0))
}

impl Accumulator for QuantileAcc {
    fn update(&mut self, values: &Array) {
        let batch = valid_floats(values);
        if batch.is_empty() {
            return;
        }
        match self {
            QuantileAcc::Estimate { digest, .. } => *digest = digest.merge_unsorted(batch),
            QuantileAcc::ExactMean { values, .. } => values.extend(batch),
        }
    }

    fn output_type(&self) -> ColType {
        ColType::Float
    }

    fn value(&self) -> Value {
        match self {
            QuantileAcc::Estimate { digest, q } => {
                if digest.is_empty() {
                    Value::Null
                } else {
                    Value::Float(digest.estimate_quantile(*q))
                }
            }
            QuantileAcc::ExactMean { values, q } => {
                let mut sorted = values.clone();
                exact_mean(&mut sorted, *q).into()
            }
        }
    }
}

pub struct Quantile {
    columns: Vec<String>,
    q: f64,
    method: QuantileMethod,
    compression: f64,
}

impl AggregateAlgorithm for Quantile {
    type Accumulator = QuantileAcc;

    fn name(&self) -> &'static str {
        "quantile"
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn accumulator(&self, col: &ColMeta) -> Result<QuantileAcc> {
        if !col.ty.is_numeric() {
            return Err(Error::FailedPrecondition(format!(
                "cannot compute quantile of column {} (type {})",
                col.label, col.ty
            )));
        }
        Ok(match self.method {
            QuantileMethod::ExactMean => QuantileAcc::ExactMean {
                values: Vec::new(),
                q: self.q,
            },
            _ => QuantileAcc::Estimate {
                digest: TDigest::new_with_size((self.compression as usize).max(1)),
                q: self.q,
            },
        })
    }
}

/// Total order within one column type; false sorts before true.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) | (Value::Time(x), Value::Time(y)) => x.cmp(y),
        (Value::UInt(x), Value::UInt(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[derive(Default)]
pub struct SelectorState {
    schema: SchemaLock,
    chunks: Vec<Chunk>,
}

pub struct ExactSelector {
    column: String,
    q: f64,
}

impl ExactSelector {
    fn select(&self, chunks: &[Chunk]) -> Option<Chunk> {
        let mut candidates: Vec<(Value, usize, usize)> = Vec::new();
        for (c, chunk) in chunks.iter().enumerate() {
            let Some(j) = chunk.column_index(&self.column) else {
                continue;
            };
            let values = chunk.values(j);
            for i in 0..chunk.len() {
                if values.is_valid(i) {
                    candidates.push((values.value(i), c, i));
                }
            }
        }
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| compare(&a.0, &b.0));
        let n = candidates.len() as f64;
        let idx = ((self.q * n).ceil() as i64 - 1).clamp(0, candidates.len() as i64 - 1) as usize;
        let (_, c, i) = &candidates[idx];
        Some(chunks[*c].slice(*i, 1))
    }
}

pub struct SelectorPartition {
    state: SelectorState,
    selector: Arc<ExactSelector>,
}

impl PartitionState for SelectorPartition {
    fn finish(&mut self, _key: &GroupKey, d: &TransportDataset, _alloc: &dyn Allocator) -> Result<()> {
        let chunks = std::mem::take(&mut self.state.chunks);
        if let Some(row) = self.selector.select(&chunks) {
            d.process(row)?;
        }
        Ok(())
    }
}

pub struct ExactSelectorTransformation {
    selector: Arc<ExactSelector>,
}

impl NarrowStateTransformation for ExactSelectorTransformation {
    type State = SelectorPartition;

    fn name(&self) -> &'static str {
        "quantile"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<SelectorPartition>,
        _d: &TransportDataset,
        _alloc: &dyn Allocator,
    ) -> Result<(SelectorPartition, bool)> {
        let mut st = state.unwrap_or_else(|| SelectorPartition {
            state: SelectorState::default(),
            selector: Arc::clone(&self.selector),
        });
        let column = &self.selector.column;
        let j = chunk.column_index(column).ok_or_else(|| {
            Error::FailedPrecondition(format!("no column \"{column}\" exists"))
        })?;
        st.state.schema.check(chunk.col(j))?;
        if !chunk.is_empty() {
            st.state.chunks.push(chunk.retain());
        }
        Ok((st, false))
    }
}

pub fn new_quantile_transformation(
    id: DatasetId,
    spec: &QuantileSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    spec.validate()?;
    if spec.method == QuantileMethod::ExactSelector {
        let t = ExactSelectorTransformation {
            selector: Arc::new(ExactSelector {
                column: spec.column.clone(),
                q: spec.q,
            }),
        };
        return Ok(new_narrow_state_transformation(id, t, alloc));
    }
    let alg = Quantile {
        columns: vec![spec.column.clone()],
        q: spec.q,
        method: spec.method,
        compression: spec.compression_or_default(),
    };
    Ok(new_aggregate_transformation(id, alg, alloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_mean_interpolates() {
        assert_eq!(exact_mean(&mut [3.0, 2.0, 2.0], 0.5), Some(2.0));
        assert_eq!(exact_mean(&mut [1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
        assert_eq!(exact_mean(&mut [5.0, 1.0], 0.0), Some(1.0));
        assert_eq!(exact_mean(&mut [5.0, 1.0], 1.0), Some(5.0));
        assert_eq!(exact_mean(&mut [], 0.5), None);
    }

    #[test]
    fn exact_mean_with_infinite_lower_neighbour() {
        let got = exact_mean(&mut [5.0, f64::NEG_INFINITY], 0.5);
        assert_eq!(got, Some(f64::NEG_INFINITY));
        assert_eq!(exact_mean(&mut [1.0, 3.0], 0.25), Some(1.5));
    }

    #[test]
    fn bools_order_false_first() {
        assert_eq!(
            compare(&Value::Bool(false), &Value::Bool(true)),
            Ordering::Less
        );
    }
}
