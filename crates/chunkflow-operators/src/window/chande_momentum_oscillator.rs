//! Chande momentum oscillator: `100 * (up - down) / (up + down)` over the last
//! `n` moves between consecutive values.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::Result;
use chunkflow_core::id::DatasetId;

use super::{new_windowed_transformation, Estimator, Ring, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::PeriodSpec;
use crate::traits::Transformation;

#[derive(Debug, Clone)]
pub struct ChandeMomentum {
    prev: Option<f64>,
    moves: Ring<(f64, f64)>,
}

impl ChandeMomentum {
    pub fn new(n: usize) -> Self {
        Self {
            prev: None,
            moves: Ring::new(n),
        }
    }
}

impl Estimator for ChandeMomentum {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        // Nulls and the very first value move nothing.
        let mv = match (v, self.prev) {
            (Some(x), Some(p)) => ((x - p).max(0.0), (p - x).max(0.0)),
            _ => (0.0, 0.0),
        };
        if v.is_some() {
            self.prev = v;
        }
        self.moves.push(mv);
        let (up, down) = self
            .moves
            .iter()
            .fold((0.0_f64, 0.0_f64), |(u, d), &(mu, md)| (u + mu, d + md));
        Some(100.0 * (up - down) / (up + down))
    }
}

pub struct ChandeMomentumOscillator {
    n: usize,
    columns: Vec<String>,
}

impl WindowedAlgorithm for ChandeMomentumOscillator {
    type Estimator = ChandeMomentum;

    const NAME: &'static str = "chande_momentum_oscillator";

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        self.n
    }

    fn estimator(&self) -> ChandeMomentum {
        ChandeMomentum::new(self.n)
    }
}

pub fn new_chande_momentum_oscillator_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = ChandeMomentumOscillator {
        n: spec.period("chande momentum oscillator")?,
        columns: spec.columns.clone(),
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}
