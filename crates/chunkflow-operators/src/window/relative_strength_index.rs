//! Relative strength index: `100 - 100 / (1 + up / down)`, where `up` and
//! `down` are Wilder-smoothed averages (`k = 1/n`) of the upward and downward
//! moves between consecutive valid values. The first valid value moves
//! against zero.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::Result;
use chunkflow_core::id::DatasetId;

use super::exponential::Ema;
use super::{new_windowed_transformation, Estimator, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::PeriodSpec;
use crate::traits::Transformation;

fn rsi(up: f64, down: f64) -> f64 {
    100.0 - 100.0 / (1.0 + up / down)
}

#[derive(Debug, Clone)]
pub struct RelativeStrength {
    up: Ema,
    down: Ema,
    prev: f64,
    any_valid: bool,
}

impl RelativeStrength {
    pub fn new(n: usize) -> Self {
        let k = 1.0 / n as f64;
        Self {
            up: Ema::with_multiplier(n, k),
            down: Ema::with_multiplier(n, k),
            prev: 0.0,
            any_valid: false,
        }
    }
}

impl Estimator for RelativeStrength {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        let (up, down) = match v {
            Some(x) => {
                let moves = ((x - self.prev).max(0.0), (self.prev - x).max(0.0));
                self.prev = x;
                self.any_valid = true;
                (self.up.push(Some(moves.0)), self.down.push(Some(moves.1)))
            }
            None => (self.up.push(None), self.down.push(None)),
        };
        if !self.any_valid {
            return None;
        }
        up.zip(down).map(|(u, d)| rsi(u, d))
    }

    /// Unsmoothed averages of the moves seen so far.
    fn short_value(&self) -> Option<Option<f64>> {
        let (up, down) = (self.up.short_value()?, self.down.short_value()?);
        Some(up.zip(down).map(|(u, d)| rsi(u, d)))
    }
}

pub struct RelativeStrengthIndex {
    n: usize,
    columns: Vec<String>,
}

impl WindowedAlgorithm for RelativeStrengthIndex {
    type Estimator = RelativeStrength;

    const NAME: &'static str = "relative_strength_index";

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        self.n
    }

    fn estimator(&self) -> RelativeStrength {
        RelativeStrength::new(self.n)
    }
}

pub fn new_relative_strength_index_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = RelativeStrengthIndex {
        n: spec.period("relative strength index")?,
        columns: spec.columns.clone(),
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}
