//! Shift time columns (and matching group key values) by a fixed duration.

use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::builder::TimeBuilder;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use crate::adapter::new_narrow_transformation;
use crate::dataset::TransportDataset;
use crate::plan::TimeShiftSpec;
use crate::traits::{NarrowTransformation, Transformation};

pub struct TimeShift {
    shift: i64,
    columns: Vec<String>,
}

impl TimeShift {
    fn is_shifted(&self, label: &str) -> bool {
        self.columns.iter().any(|c| c == label)
    }

    fn check(col: &ColMeta) -> Result<()> {
        if col.ty == ColType::Time {
            return Ok(());
        }
        Err(Error::FailedPrecondition(format!(
            "column \"{}\" is not of time type",
            col.label
        )))
    }

    fn add(&self, t: i64, label: &str) -> Result<i64> {
        t.checked_add(self.shift).ok_or_else(|| {
            Error::OutOfRange(format!(
                "shifting {t}ns by {}ns overflows column \"{label}\"",
                self.shift
            ))
        })
    }

    fn shift_key(&self, key: &GroupKey) -> Result<GroupKey> {
        if !key.cols().iter().any(|c| self.is_shifted(&c.label)) {
            return Ok(key.clone());
        }
        let mut values = Vec::with_capacity(key.len());
        for (col, v) in key.cols().iter().zip(key.values()) {
            if !self.is_shifted(&col.label) {
                values.push(v.clone());
                continue;
            }
            Self::check(col)?;
            values.push(match v {
                Value::Time(t) => Value::Time(self.add(*t, &col.label)?),
                other => other.clone(),
            });
        }
        key.with_values(values)
    }

    fn shift_times(&self, values: &Array, label: &str, alloc: &dyn Allocator) -> Result<Array> {
        let times = values.times().unwrap_or_default();
        let mut b = TimeBuilder::new(alloc)?;
        b.resize(times.len())?;
        for (i, &t) in times.iter().enumerate() {
            if values.is_valid(i) {
                b.append(self.add(t, label)?);
            } else {
                b.append_null();
            }
        }
        b.finish()
    }
}

impl NarrowTransformation for TimeShift {
    fn name(&self) -> &'static str {
        "timeshift"
    }

    fn process(&mut self, chunk: Chunk, d: &TransportDataset, alloc: &dyn Allocator) -> Result<()> {
        let key = self.output_key(chunk.key())?;
        let mut buffers = Vec::with_capacity(chunk.num_cols());
        for (col, values) in chunk.cols().iter().zip(chunk.buffers()) {
            if self.is_shifted(&col.label) {
                Self::check(col)?;
                buffers.push(self.shift_times(values, &col.label, alloc)?);
            } else {
                buffers.push(values.clone());
            }
        }
        let out = Chunk::new(key, chunk.cols().to_vec(), buffers)?;
        d.process(out)
    }

    fn output_key(&self, key: &GroupKey) -> Result<GroupKey> {
        self.shift_key(key)
    }
}

pub fn new_timeshift_transformation(
    id: DatasetId,
    spec: &TimeShiftSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let t = TimeShift {
        shift: spec.shift,
        columns: spec.columns.clone(),
    };
    Ok(new_narrow_transformation(id, t, alloc))
}
