//! `stddev` and `skew` from single-pass central moments (Welford).

use std::sync::Arc;

use chunkflow_core::array::Array;
use chunkflow_core::budget::Allocator;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, ColType};
use chunkflow_core::value::Value;

use super::{new_aggregate_transformation, Accumulator, AggregateAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::{AggregateSpec, Mode, MomentSpec};
use crate::traits::Transformation;

/// Count, mean and the second and third central moment sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub n: f64,
    pub mean: f64,
    pub m2: f64,
    pub m3: f64,
}

impl Moments {
    pub fn push(&mut self, x: f64) {
        let n1 = self.n;
        self.n += 1.0;
        let delta = x - self.mean;
        let delta_n = delta / self.n;
        let term1 = delta * delta_n * n1;
        self.mean += delta_n;
        self.m3 += term1 * delta_n * (self.n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
    }

    /// NaN with fewer than two points in either mode.
    pub fn stddev(&self, mode: Mode) -> f64 {
        if self.n < 2.0 {
            return f64::NAN;
        }
        let dof = match mode {
            Mode::Sample => self.n - 1.0,
            Mode::Population => self.n,
        };
        (self.m2 / dof).sqrt()
    }

    pub fn skew(&self) -> f64 {
        if self.n < 2.0 || self.m2 == 0.0 {
            return f64::NAN;
        }
        self.n.sqrt() * self.m3 / self.m2.powf(1.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Stddev(Mode),
    Skew,
}

#[derive(Debug, Clone, Copy)]
pub struct MomentAcc {
    moments: Moments,
    stat: Statistic,
}

impl Accumulator for MomentAcc {
    fn update(&mut self, values: &Array) {
        for i in 0..values.len() {
            if let Some(x) = values.f64_at(i) {
                self.moments.push(x);
            }
        }
    }

    fn output_type(&self) -> ColType {
        ColType::Float
    }

    fn value(&self) -> Value {
        Value::Float(match self.stat {
            Statistic::Stddev(mode) => self.moments.stddev(mode),
            Statistic::Skew => self.moments.skew(),
        })
    }
}

pub struct MomentAggregate {
    columns: Vec<String>,
    stat: Statistic,
}

impl AggregateAlgorithm for MomentAggregate {
    type Accumulator = MomentAcc;

    fn name(&self) -> &'static str {
        match self.stat {
            Statistic::Stddev(_) => "stddev",
            Statistic::Skew => "skew",
        }
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn accumulator(&self, col: &ColMeta) -> Result<MomentAcc> {
        if !col.ty.is_numeric() {
            return Err(Error::FailedPrecondition(format!(
                "cannot compute {} of column {} (type {})",
                self.name(),
                col.label,
                col.ty
            )));
        }
        Ok(MomentAcc {
            moments: Moments::default(),
            stat: self.stat,
        })
    }
}

pub fn new_stddev_transformation(
    id: DatasetId,
    spec: &MomentSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = MomentAggregate {
        columns: spec.columns.clone(),
        stat: Statistic::Stddev(spec.mode),
    };
    Ok(new_aggregate_transformation(id, alg, alloc))
}

pub fn new_skew_transformation(
    id: DatasetId,
    spec: &AggregateSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = MomentAggregate {
        columns: spec.columns.clone(),
        stat: Statistic::Skew,
    };
    Ok(new_aggregate_transformation(id, alg, alloc))
}
