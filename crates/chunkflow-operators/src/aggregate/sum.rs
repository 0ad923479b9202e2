//! `sum` and `count`.

use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use super::{new_aggregate_transformation, Accumulator, AggregateAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::AggregateSpec;
use crate::traits::Transformation;

/// Integer sums wrap on overflow; nulls are skipped.
#[derive(Debug, Clone, Copy)]
pub enum SumAcc {
    Int { sum: i64, any: bool },
    UInt { sum: u64, any: bool },
    Float { sum: f64, any: bool },
}

fn valid<'a, T: Copy>(values: &'a Array, src: &'a [T]) -> impl Iterator<Item = T> + 'a {
    src.iter()
        .enumerate()
        .filter(|(i, _)| values.is_valid(*i))
        .map(|(_, v)| *v)
}

impl Accumulator for SumAcc {
    fn update(&mut self, values: &Array) {
        match self {
            SumAcc::Int { sum, any } => {
                for v in valid(values, values.ints().unwrap_or_default()) {
                    *sum = sum.wrapping_add(v);
                    *any = true;
                }
            }
            SumAcc::UInt { sum, any } => {
                for v in valid(values, values.uints().unwrap_or_default()) {
                    *sum = sum.wrapping_add(v);
                    *any = true;
                }
            }
            SumAcc::Float { sum, any } => {
                for v in valid(values, values.floats().unwrap_or_default()) {
                    *sum += v;
                    *any = true;
                }
            }
        }
    }

    fn output_type(&self) -> ColType {
        match self {
            SumAcc::Int { .. } => ColType::Int,
            SumAcc::UInt { .. } => ColType::UInt,
            SumAcc::Float { .. } => ColType::Float,
        }
    }

    fn value(&self) -> Value {
        match *self {
            SumAcc::Int { sum, any: true } => Value::Int(sum),
            SumAcc::UInt { sum, any: true } => Value::UInt(sum),
            SumAcc::Float { sum, any: true } => Value::Float(sum),
            _ => Value::Null,
        }
    }
}

pub struct Sum {
    columns: Vec<String>,
}

impl AggregateAlgorithm for Sum {
    type Accumulator = SumAcc;

    fn name(&self) -> &'static str {
        "sum"
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn accumulator(&self, col: &ColMeta) -> Result<SumAcc> {
        match col.ty {
            ColType::Int => Ok(SumAcc::Int { sum: 0, any: false }),
            ColType::UInt => Ok(SumAcc::UInt { sum: 0, any: false }),
            ColType::Float => Ok(SumAcc::Float {
                sum: 0.0,
                any: false,
            }),
            other => Err(Error::Unimplemented(format!(
                "sum of column {} with type {other} is not supported",
                col.label
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountAcc(i64);

impl Accumulator for CountAcc {
    fn update(&mut self, values: &Array) {
        self.0 += (values.len() - values.null_count()) as i64;
    }

    fn output_type(&self) -> ColType {
        ColType::Int
    }

    fn value(&self) -> Value {
        Value::Int(self.0)
    }
}

pub struct Count {
    columns: Vec<String>,
}

impl AggregateAlgorithm for Count {
    type Accumulator = CountAcc;

    fn name(&self) -> &'static str {
        "count"
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn accumulator(&self, _col: &ColMeta) -> Result<CountAcc> {
        Ok(CountAcc::default())
    }
}

pub fn new_sum_transformation(
    id: DatasetId,
    spec: &AggregateSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = Sum {
        columns: spec.columns.clone(),
    };
    Ok(new_aggregate_transformation(id, alg, alloc))
}

pub fn new_count_transformation(
    id: DatasetId,
    spec: &AggregateSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = Count {
        columns: spec.columns.clone(),
    };
    Ok(new_aggregate_transformation(id, alg, alloc))
}
