//! Simple moving average over the last `n` rows.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::Result;
use chunkflow_core::id::DatasetId;

use super::{new_windowed_transformation, Estimator, Ring, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::PeriodSpec;
use crate::traits::Transformation;

/// Average of the valid entries among the last `n` rows; nulls occupy a slot
/// but do not count. Null when the window holds no valid entry.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: Ring<Option<f64>>,
}

impl MovingAverage {
    pub fn new(n: usize) -> Self {
        Self {
            window: Ring::new(n),
        }
    }

    fn average(&self) -> Option<f64> {
        let (sum, count) = self
            .window
            .iter()
            .flatten()
            .fold((0.0_f64, 0usize), |(s, c), &v| (s + v, c + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

impl Estimator for MovingAverage {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        self.window.push(v);
        self.average()
    }

    fn short_value(&self) -> Option<Option<f64>> {
        Some(self.average())
    }
}

pub struct MovingAverageAlgorithm {
    n: usize,
    columns: Vec<String>,
}

impl WindowedAlgorithm for MovingAverageAlgorithm {
    type Estimator = MovingAverage;

    const NAME: &'static str = "moving_average";

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        self.n - 1
    }

    fn estimator(&self) -> MovingAverage {
        MovingAverage::new(self.n)
    }

    fn require_columns(&self) -> bool {
        true
    }
}

pub fn new_moving_average_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = MovingAverageAlgorithm {
        n: spec.period("moving average")?,
        columns: spec.columns.clone(),
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_hold_a_slot() {
        let mut ma = MovingAverage::new(2);
        assert_eq!(ma.push(Some(2.0)), Some(2.0));
        assert_eq!(ma.push(None), Some(2.0));
        assert_eq!(ma.push(None), None);
        assert_eq!(ma.push(Some(6.0)), Some(6.0));
        assert_eq!(ma.push(Some(8.0)), Some(7.0));
    }
}
