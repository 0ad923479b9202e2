//! Kaufman's adaptive moving average.
//!
//! The smoothing constant follows the efficiency ratio of the last `n` moves:
//! `ER = |p - p[n ago]| / sum(|moves|)`, `SC = (ER * (fast - slow) + slow)^2`
//! with `fast = 2/3` and `slow = 2/31`. Null rows emit null and are skipped.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::Result;
use chunkflow_core::id::DatasetId;

use super::{new_windowed_transformation, Estimator, Ring, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::KaufmansAmaSpec;
use crate::traits::Transformation;

const FAST: f64 = 2.0 / 3.0;
const SLOW: f64 = 2.0 / 31.0;

#[derive(Debug, Clone)]
pub struct KaufmansAma {
    n: usize,
    history: Ring<f64>,
    valid: usize,
    kama: f64,
}

impl KaufmansAma {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            history: Ring::new(n + 1),
            valid: 0,
            kama: 0.0,
        }
    }

    fn efficiency(&self, p: f64) -> f64 {
        let oldest = self.history.front().copied().unwrap_or(p);
        let mut volatility = 0.0;
        let mut prev = oldest;
        for &h in self.history.iter().skip(1) {
            volatility += (h - prev).abs();
            prev = h;
        }
        if volatility == 0.0 {
            0.0
        } else {
            (p - oldest).abs() / volatility
        }
    }
}

impl Estimator for KaufmansAma {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        let p = v?;
        self.history.push(p);
        self.valid += 1;
        if self.valid < self.n {
            return None;
        }
        if self.valid == self.n {
            self.kama = p;
            return None;
        }
        let sc = (self.efficiency(p) * (FAST - SLOW) + SLOW).powi(2);
        self.kama += sc * (p - self.kama);
        Some(self.kama)
    }
}

pub struct KaufmansAdaptiveMovingAverage {
    n: usize,
    columns: Vec<String>,
}

impl WindowedAlgorithm for KaufmansAdaptiveMovingAverage {
    type Estimator = KaufmansAma;

    const NAME: &'static str = "kaufmans_adaptive_moving_average";

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        self.n
    }

    fn estimator(&self) -> KaufmansAma {
        KaufmansAma::new(self.n)
    }
}

pub fn new_kaufmans_ama_transformation(
    id: DatasetId,
    spec: &KaufmansAmaSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = KaufmansAdaptiveMovingAverage {
        n: spec.period()?,
        columns: vec![spec.column.clone()],
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_stays_flat() {
        let mut k = KaufmansAma::new(3);
        let outs: Vec<_> = (0..6).map(|_| k.push(Some(5.0))).collect();
        assert_eq!(outs[..3], [None, None, None]);
        assert!(outs[3..].iter().all(|o| *o == Some(5.0)));
    }

    #[test]
    fn trending_series_moves_at_fast_rate() {
        let mut k = KaufmansAma::new(2);
        assert_eq!(k.push(Some(1.0)), None);
        assert_eq!(k.push(Some(2.0)), None);
        assert_eq!(k.push(None), None);
        // ER = 1 on a straight line, so SC = FAST^2.
        let out = k.push(Some(3.0)).expect("kama");
        assert!((out - (2.0 + FAST * FAST)).abs() < 1e-12);
    }
}
