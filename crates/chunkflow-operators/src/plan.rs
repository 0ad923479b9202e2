//! Procedure specs: the serde-facing parameters of every transformation.
//!
//! Specs arrive from a planner as JSON. Missing fields take the defaults below;
//! `validate()` runs before any transformation is built.

use serde::{Deserialize, Serialize};

use chunkflow_core::error::{Error, Result};
use chunkflow_core::schema::{
    DEFAULT_START_LABEL, DEFAULT_STOP_LABEL, DEFAULT_TIME_LABEL, DEFAULT_VALUE_LABEL,
};

/// One second in nanoseconds.
pub const SECOND_NS: i64 = 1_000_000_000;

fn default_columns() -> Vec<String> {
    vec![DEFAULT_VALUE_LABEL.to_string()]
}

fn default_column() -> String {
    DEFAULT_VALUE_LABEL.to_string()
}

fn default_time_column() -> String {
    DEFAULT_TIME_LABEL.to_string()
}

fn default_unit() -> i64 {
    SECOND_NS
}

fn default_shift_columns() -> Vec<String> {
    vec![
        DEFAULT_START_LABEL.to_string(),
        DEFAULT_STOP_LABEL.to_string(),
        DEFAULT_TIME_LABEL.to_string(),
    ]
}

fn check_period(what: &str, n: i64) -> Result<usize> {
    if n <= 0 {
        return Err(Error::Invalid(format!(
            "cannot take {what} with a period of {n} (must be greater than 0)"
        )));
    }
    usize::try_from(n).map_err(|_| Error::Invalid(format!("period {n} is too large")))
}

/// Period plus target columns; shared by the moving-average family and CMO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub n: i64,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

impl PeriodSpec {
    pub fn new(n: i64) -> Self {
        Self {
            n,
            columns: default_columns(),
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// The validated period.
    pub fn period(&self, what: &str) -> Result<usize> {
        check_period(what, self.n)
    }
}

/// Triple exponential derivative always reads `_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleExponentialDerivativeSpec {
    pub n: i64,
}

impl TripleExponentialDerivativeSpec {
    pub fn period(&self) -> Result<usize> {
        check_period("triple exponential derivative", self.n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaufmansAmaSpec {
    pub n: i64,
    #[serde(default = "default_column")]
    pub column: String,
}

impl KaufmansAmaSpec {
    pub fn new(n: i64) -> Self {
        Self {
            n,
            column: default_column(),
        }
    }

    pub fn period(&self) -> Result<usize> {
        check_period("kaufman's adaptive moving average", self.n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeSumSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

impl Default for CumulativeSumSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    /// Nanoseconds per output unit.
    #[serde(default = "default_unit")]
    pub unit: i64,
    #[serde(default)]
    pub non_negative: bool,
    #[serde(default)]
    pub initial_zero: bool,
}

impl Default for DerivativeSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            time_column: default_time_column(),
            unit: default_unit(),
            non_negative: false,
            initial_zero: false,
        }
    }
}

impl DerivativeSpec {
    pub fn validate(&self) -> Result<()> {
        if self.unit <= 0 {
            return Err(Error::Invalid(format!(
                "derivative unit must be greater than 0, got {}ns",
                self.unit
            )));
        }
        Ok(())
    }
}

/// Trapezoidal area under each target column, per partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    /// Nanoseconds per output unit.
    #[serde(default = "default_unit")]
    pub unit: i64,
}

impl Default for IntegralSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            time_column: default_time_column(),
            unit: default_unit(),
        }
    }
}

impl IntegralSpec {
    pub fn validate(&self) -> Result<()> {
        if self.unit <= 0 {
            return Err(Error::Invalid(format!(
                "integral unit must be greater than 0, got {}ns",
                self.unit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub non_negative: bool,
    #[serde(default)]
    pub keep_first: bool,
    #[serde(default)]
    pub initial_zero: bool,
}

impl Default for DifferenceSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            non_negative: false,
            keep_first: false,
            initial_zero: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeShiftSpec {
    /// Nanoseconds; may be negative.
    pub shift: i64,
    #[serde(default = "default_shift_columns")]
    pub columns: Vec<String>,
}

impl TimeShiftSpec {
    pub fn new(shift: i64) -> Self {
        Self {
            shift,
            columns: default_shift_columns(),
        }
    }
}

/// Columns reduced by `sum` and `count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

impl Default for AggregateSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Sample,
    Population,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentSpec {
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub mode: Mode,
}

impl Default for MomentSpec {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            mode: Mode::Sample,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    #[default]
    EstimateTdigest,
    ExactMean,
    ExactSelector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileSpec {
    pub q: f64,
    #[serde(default)]
    pub method: QuantileMethod,
    /// Only meaningful for `estimate_tdigest`.
    #[serde(default)]
    pub compression: Option<f64>,
    #[serde(default = "default_column")]
    pub column: String,
}

impl QuantileSpec {
    pub const DEFAULT_COMPRESSION: f64 = 1000.0;

    pub fn new(q: f64, method: QuantileMethod) -> Self {
        Self {
            q,
            method,
            compression: None,
            column: default_column(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.q) {
            return Err(Error::Invalid(format!(
                "quantile must be between 0 and 1, got {}",
                self.q
            )));
        }
        match (self.method, self.compression) {
            (QuantileMethod::EstimateTdigest, Some(c)) if !(c > 0.0) => Err(Error::Invalid(
                format!("compression must be greater than 0, got {c}"),
            )),
            (QuantileMethod::EstimateTdigest, _) | (_, None) => Ok(()),
            (method, Some(_)) => Err(Error::Invalid(format!(
                "compression parameter is only valid for method estimate_tdigest, got {method:?}"
            ))),
        }
    }

    pub fn compression_or_default(&self) -> f64 {
        self.compression.unwrap_or(Self::DEFAULT_COMPRESSION)
    }
}
