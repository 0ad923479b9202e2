//! Area under each target column over time, by the trapezoidal rule.
//!
//! One row per partition: the group key plus one float per target column.
//! Time ordering follows `derivative`: repeated instants are skipped and an
//! earlier or null time fails the partition. Null values are skipped and the
//! next valid value bridges the gap.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use super::{time_column_index, TimeCursor};
use crate::adapter::new_narrow_state_transformation;
use crate::aggregate::emit_row;
use crate::dataset::TransportDataset;
use crate::kernels::SchemaLock;
use crate::plan::IntegralSpec;
use crate::traits::{NarrowStateTransformation, PartitionState, Transformation};

#[derive(Debug, Clone, Copy, Default)]
struct Trapezoid {
    prev: Option<(i64, f64)>,
    area: f64,
}

impl Trapezoid {
    fn push(&mut self, t: i64, v: f64, unit: f64) {
        if let Some((pt, pv)) = self.prev {
            let elapsed = (i128::from(t) - i128::from(pt)) as f64 / unit;
            self.area += 0.5 * (v + pv) * elapsed;
        }
        self.prev = Some((t, v));
    }
}

pub struct IntegralState {
    schema: SchemaLock,
    cursor: TimeCursor,
    /// In configured column order.
    areas: Vec<(String, Trapezoid)>,
    done: bool,
}

impl PartitionState for IntegralState {
    fn finish(&mut self, key: &GroupKey, d: &TransportDataset, alloc: &dyn Allocator) -> Result<()> {
        if std::mem::replace(&mut self.done, true) {
            return Ok(());
        }
        let extra = self
            .areas
            .iter()
            .map(|(label, tz)| {
                let col = ColMeta::new(label.clone(), ColType::Float);
                (col, Value::Float(tz.area))
            })
            .collect();
        emit_row(key, extra, d, alloc)
    }
}

pub struct Integral {
    unit: f64,
    columns: Vec<String>,
    time_column: String,
}

impl Integral {
    fn targets(&self, chunk: &Chunk, schema: &mut SchemaLock) -> Result<Vec<usize>> {
        let mut targets = Vec::with_capacity(self.columns.len());
        for label in &self.columns {
            if chunk.key().index_of(label).is_some() {
                return Err(Error::FailedPrecondition(
                    "cannot aggregate columns that are part of the group key".into(),
                ));
            }
            let j = chunk.column_index(label).ok_or_else(|| {
                Error::FailedPrecondition(format!("column \"{label}\" does not exist"))
            })?;
            let col = chunk.col(j);
            if !col.ty.is_numeric() {
                return Err(Error::FailedPrecondition(format!(
                    "cannot perform integral over {}",
                    col.ty
                )));
            }
            schema.check(col)?;
            targets.push(j);
        }
        Ok(targets)
    }
}

impl NarrowStateTransformation for Integral {
    type State = IntegralState;

    fn name(&self) -> &'static str {
        "integral"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<IntegralState>,
        _d: &TransportDataset,
        _alloc: &dyn Allocator,
    ) -> Result<(IntegralState, bool)> {
        let time_idx = time_column_index(&chunk, &self.time_column)?;
        let mut st = state.unwrap_or_else(|| IntegralState {
            schema: SchemaLock::default(),
            cursor: TimeCursor::default(),
            areas: self
                .columns
                .iter()
                .map(|c| (c.clone(), Trapezoid::default()))
                .collect(),
            done: false,
        });

        let targets = self.targets(&chunk, &mut st.schema)?;
        let ts = chunk.times(time_idx)?;
        let kept = st.cursor.advance("integral", ts)?;
        let times = ts.times().unwrap_or_default();
        for ((_, tz), j) in st.areas.iter_mut().zip(targets) {
            let values = chunk.values(j);
            for &i in &kept {
                if let Some(v) = values.f64_at(i) {
                    tz.push(times[i], v, self.unit);
                }
            }
        }
        Ok((st, false))
    }
}

pub fn new_integral_transformation(
    id: DatasetId,
    spec: &IntegralSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    spec.validate()?;
    let t = Integral {
        unit: spec.unit as f64,
        columns: spec.columns.clone(),
        time_column: spec.time_column.clone(),
    };
    Ok(new_narrow_state_transformation(id, t, alloc))
}

#[cfg(test)]
mod tests {
    use super::Trapezoid;

    #[test]
    fn sums_trapezoids_between_valid_points() {
        let mut tz = Trapezoid::default();
        tz.push(1, 2.0, 1.0);
        tz.push(2, 1.0, 1.0);
        assert_eq!(tz.area, 1.5);
        tz.push(4, 1.0, 2.0);
        assert_eq!(tz.area, 2.5);
    }

    #[test]
    fn extreme_instants_do_not_overflow() {
        let mut tz = Trapezoid::default();
        tz.push(i64::MIN, 1.0, 1e18);
        tz.push(i64::MAX, 1.0, 1e18);
        assert!(tz.area.is_finite() && tz.area > 18.0);
    }
}
