//! Triple exponential derivative (TRIX): percentage rate of change of a triple
//! EMA between consecutive rows.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::id::DatasetId;
use chunkflow_core::schema::{ColMeta, DEFAULT_VALUE_LABEL};

use super::exponential::Tema;
use super::{new_windowed_transformation, Estimator, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::TripleExponentialDerivativeSpec;
use crate::traits::Transformation;

#[derive(Debug, Clone)]
pub struct TripleExponentialDerivative {
    chain: Tema,
    prev: Option<f64>,
}

impl TripleExponentialDerivative {
    pub fn new(n: usize) -> Self {
        Self {
            chain: Tema::new(n),
            prev: None,
        }
    }
}

impl Estimator for TripleExponentialDerivative {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        let was_primed = self.chain.is_primed();
        let (_, _, c) = self.chain.stages(v);
        let out = match (was_primed, c, self.prev) {
            (true, Some(c), Some(p)) => Some((c / p - 1.0) * 100.0),
            _ => None,
        };
        if self.chain.is_primed() {
            self.prev = c;
        }
        out
    }

    fn short_value(&self) -> Option<Option<f64>> {
        if self.chain.is_primed() {
            None
        } else {
            Some(None)
        }
    }
}

pub struct TripleExponentialDerivativeAlgorithm {
    n: usize,
    columns: Vec<String>,
}

impl WindowedAlgorithm for TripleExponentialDerivativeAlgorithm {
    type Estimator = TripleExponentialDerivative;

    const NAME: &'static str = "triple_exponential_derivative";

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        3 * (self.n - 1) + 1
    }

    fn estimator(&self) -> TripleExponentialDerivative {
        TripleExponentialDerivative::new(self.n)
    }

    fn check_column(&self, col: &ColMeta) -> Result<()> {
        if col.ty.is_numeric() {
            return Ok(());
        }
        Err(Error::FailedPrecondition(format!(
            "cannot take exponential moving average of column {} (type {})",
            col.label, col.ty
        )))
    }

    fn require_columns(&self) -> bool {
        true
    }
}

pub fn new_triple_exponential_derivative_transformation(
    id: DatasetId,
    spec: &TripleExponentialDerivativeSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = TripleExponentialDerivativeAlgorithm {
        n: spec.period()?,
        columns: vec![DEFAULT_VALUE_LABEL.to_string()],
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ratio_follows_first_triple_value() {
        let mut t = TripleExponentialDerivative::new(1);
        // n = 1 makes every stage the identity.
        assert_eq!(t.push(Some(2.0)), None);
        assert_eq!(t.push(Some(3.0)), Some(50.0));
        // A null repeats the previous average, so the change is zero.
        assert_eq!(t.push(None), Some(0.0));
        assert_eq!(t.push(Some(6.0)), Some(100.0));
        assert_eq!(t.short_value(), None);
    }
}
