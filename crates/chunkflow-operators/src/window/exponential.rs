//! Exponential moving averages: single, double and triple.
//!
//! An EMA of period `n` uses `k = 2 / (n + 1)`. Its first output is the simple
//! average of the first `n` rows; every later row emits `v*k + prev*(1-k)`.
//! Chained EMAs only start feeding the next stage once the previous stage has
//! produced its first value, so a chain of `m` stages primes `m * (n - 1)` rows.

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::error::Result;
use chunkflow_core::id::DatasetId;

use super::{new_windowed_transformation, Estimator, WindowedAlgorithm};
use crate::dataset::TransportDataset;
use crate::plan::PeriodSpec;
use crate::traits::Transformation;

#[derive(Debug, Clone)]
pub struct Ema {
    n: usize,
    k: f64,
    seen: usize,
    sum: f64,
    valid: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            k: 2.0 / (n as f64 + 1.0),
            seen: 0,
            sum: 0.0,
            valid: 0,
            value: None,
        }
    }

    /// Same priming with a custom smoothing factor (Wilder's `1/n`).
    pub(crate) fn with_multiplier(n: usize, k: f64) -> Self {
        Self { k, ..Self::new(n) }
    }

    /// The first `n` rows have been seen.
    pub fn is_primed(&self) -> bool {
        self.seen >= self.n
    }

    fn partial(&self) -> Option<f64> {
        (self.valid > 0).then(|| self.sum / self.valid as f64)
    }
}

impl Estimator for Ema {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        if self.seen < self.n {
            self.seen += 1;
            if let Some(x) = v {
                self.sum += x;
                self.valid += 1;
            }
            if self.seen < self.n {
                return None;
            }
            self.value = self.partial();
            return self.value;
        }
        self.value = match (v, self.value) {
            (None, prev) => prev,
            (Some(x), None) => Some(x),
            (Some(x), Some(prev)) => Some(x * self.k + prev * (1.0 - self.k)),
        };
        self.value
    }

    fn short_value(&self) -> Option<Option<f64>> {
        if self.is_primed() {
            None
        } else {
            Some(self.partial())
        }
    }
}

/// Feed `stage` only once `upstream` is primed.
fn chain(stage: &mut Ema, upstream: &Ema, v: Option<f64>) -> Option<f64> {
    if upstream.is_primed() {
        stage.push(v)
    } else {
        None
    }
}

/// `2*e1 - e2`.
#[derive(Debug, Clone)]
pub struct Dema {
    e1: Ema,
    e2: Ema,
}

impl Dema {
    pub fn new(n: usize) -> Self {
        Self {
            e1: Ema::new(n),
            e2: Ema::new(n),
        }
    }
}

impl Estimator for Dema {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        let a = self.e1.push(v);
        let b = chain(&mut self.e2, &self.e1, a);
        if !self.e2.is_primed() {
            return None;
        }
        Some(2.0 * a? - b?)
    }

    fn short_value(&self) -> Option<Option<f64>> {
        Some(Some(f64::NAN))
    }
}

/// `3*e1 - 3*e2 + e3`.
#[derive(Debug, Clone)]
pub struct Tema {
    e1: Ema,
    e2: Ema,
    e3: Ema,
}

impl Tema {
    pub fn new(n: usize) -> Self {
        Self {
            e1: Ema::new(n),
            e2: Ema::new(n),
            e3: Ema::new(n),
        }
    }

    /// Run all three stages; yields each stage's output for this row.
    pub(crate) fn stages(&mut self, v: Option<f64>) -> (Option<f64>, Option<f64>, Option<f64>) {
        let a = self.e1.push(v);
        let b = chain(&mut self.e2, &self.e1, a);
        let c = chain(&mut self.e3, &self.e2, b);
        (a, b, c)
    }

    pub(crate) fn is_primed(&self) -> bool {
        self.e3.is_primed()
    }
}

impl Estimator for Tema {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        let (a, b, c) = self.stages(v);
        if !self.is_primed() {
            return None;
        }
        Some(3.0 * a? - 3.0 * b? + c?)
    }

    fn short_value(&self) -> Option<Option<f64>> {
        Some(Some(f64::NAN))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Single,
    Double,
    Triple,
}

/// One estimator type for the three chain lengths.
#[derive(Debug, Clone)]
pub enum Exponential {
    Single(Ema),
    Double(Dema),
    Triple(Tema),
}

impl Estimator for Exponential {
    fn push(&mut self, v: Option<f64>) -> Option<f64> {
        match self {
            Exponential::Single(e) => e.push(v),
            Exponential::Double(e) => e.push(v),
            Exponential::Triple(e) => e.push(v),
        }
    }

    fn short_value(&self) -> Option<Option<f64>> {
        match self {
            Exponential::Single(e) => e.short_value(),
            Exponential::Double(e) => e.short_value(),
            Exponential::Triple(e) => e.short_value(),
        }
    }
}

pub struct ExponentialAlgorithm<const ORDER: u8> {
    n: usize,
    columns: Vec<String>,
}

pub type ExponentialMovingAverage = ExponentialAlgorithm<1>;
pub type DoubleExponentialMovingAverage = ExponentialAlgorithm<2>;
pub type TripleExponentialMovingAverage = ExponentialAlgorithm<3>;

impl<const ORDER: u8> ExponentialAlgorithm<ORDER> {
    fn order() -> Order {
        match ORDER {
            1 => Order::Single,
            2 => Order::Double,
            _ => Order::Triple,
        }
    }
}

impl<const ORDER: u8> WindowedAlgorithm for ExponentialAlgorithm<ORDER> {
    type Estimator = Exponential;

    const NAME: &'static str = match ORDER {
        1 => "exponential_moving_average",
        2 => "double_exponential_moving_average",
        _ => "triple_exponential_moving_average",
    };

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn deficit(&self) -> usize {
        usize::from(ORDER) * (self.n - 1)
    }

    fn estimator(&self) -> Exponential {
        match Self::order() {
            Order::Single => Exponential::Single(Ema::new(self.n)),
            Order::Double => Exponential::Double(Dema::new(self.n)),
            Order::Triple => Exponential::Triple(Tema::new(self.n)),
        }
    }
}

fn build<const ORDER: u8>(
    id: DatasetId,
    spec: &PeriodSpec,
    what: &str,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    let alg = ExponentialAlgorithm::<ORDER> {
        n: spec.period(what)?,
        columns: spec.columns.clone(),
    };
    Ok(new_windowed_transformation(id, alg, alloc))
}

pub fn new_exponential_moving_average_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    build::<1>(id, spec, "exponential moving average", alloc)
}

pub fn new_double_exponential_moving_average_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    build::<2>(id, spec, "double exponential moving average", alloc)
}

pub fn new_triple_exponential_moving_average_transformation(
    id: DatasetId,
    spec: &PeriodSpec,
    alloc: Arc<dyn Allocator>,
) -> Result<(Box<dyn Transformation>, TransportDataset)> {
    build::<3>(id, spec, "triple exponential moving average", alloc)
}
