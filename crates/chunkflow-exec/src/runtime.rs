//! Runtime: build a transformation from a `Procedure`, drive every partition
//! through it, and emit a RunManifest.
//!
//! Behavior:
//! - Enforces a hard memory ceiling via `chunkflow-mem::MemoryBudgetImpl`; every
//!   buffer an algorithm builds is accounted against it.
//! - Splits input chunks longer than `max_chunk_rows` (zero copy).
//! - Flushes each partition's key after its last chunk, then finishes.
//! - On a processing error the transformation is finished with that error,
//!   which drops all pending partition state, and the error is returned.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::config::EngineConfig;
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::hash::{hash_serde, rows_digest};
use chunkflow_core::id::DatasetId;
use chunkflow_core::manifest::RunManifest;

use chunkflow_mem::MemoryBudgetImpl;

use chunkflow_operators::dataset::{CollectingSink, TransportDataset};
use chunkflow_operators::plan::{
    AggregateSpec, CumulativeSumSpec, DerivativeSpec, DifferenceSpec, IntegralSpec,
    KaufmansAmaSpec, MomentSpec, PeriodSpec, QuantileMethod, QuantileSpec, TimeShiftSpec,
    TripleExponentialDerivativeSpec,
};
use chunkflow_operators::traits::Transformation;
use chunkflow_operators as ops;

use crate::metrics::emit_span;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Core(#[from] chunkflow_core::Error),
    #[error("invalid partition: {0}")]
    Partition(String),
}

impl ExecError {
    pub fn kind(&self) -> chunkflow_core::ErrorKind {
        match self {
            ExecError::Core(e) => e.kind(),
            ExecError::Partition(_) => chunkflow_core::ErrorKind::Invalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// One group key and its chunks, in arrival order.
pub type Partition = (GroupKey, Vec<Chunk>);

/// Every algorithm the engine can run, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Procedure {
    CumulativeSum(CumulativeSumSpec),
    MovingAverage(PeriodSpec),
    ExponentialMovingAverage(PeriodSpec),
    DoubleExponentialMovingAverage(PeriodSpec),
    TripleExponentialMovingAverage(PeriodSpec),
    TripleExponentialDerivative(TripleExponentialDerivativeSpec),
    ChandeMomentumOscillator(PeriodSpec),
    RelativeStrengthIndex(PeriodSpec),
    KaufmansAma(KaufmansAmaSpec),
    Derivative(DerivativeSpec),
    Difference(DifferenceSpec),
    Integral(IntegralSpec),
    TimeShift(TimeShiftSpec),
    Sum(AggregateSpec),
    Count(AggregateSpec),
    Stddev(MomentSpec),
    Skew(AggregateSpec),
    Quantile(QuantileSpec),
}

impl Procedure {
    fn build(
        &self,
        id: DatasetId,
        alloc: Arc<dyn Allocator>,
    ) -> chunkflow_core::Result<(Box<dyn Transformation>, TransportDataset)> {
        match self {
            Procedure::CumulativeSum(s) => ops::new_cumulative_sum_transformation(id, s, alloc),
            Procedure::MovingAverage(s) => ops::new_moving_average_transformation(id, s, alloc),
            Procedure::ExponentialMovingAverage(s) => {
                ops::new_exponential_moving_average_transformation(id, s, alloc)
            }
            Procedure::DoubleExponentialMovingAverage(s) => {
                ops::new_double_exponential_moving_average_transformation(id, s, alloc)
            }
            Procedure::TripleExponentialMovingAverage(s) => {
                ops::new_triple_exponential_moving_average_transformation(id, s, alloc)
            }
            Procedure::TripleExponentialDerivative(s) => {
                ops::new_triple_exponential_derivative_transformation(id, s, alloc)
            }
            Procedure::ChandeMomentumOscillator(s) => {
                ops::new_chande_momentum_oscillator_transformation(id, s, alloc)
            }
            Procedure::RelativeStrengthIndex(s) => {
                ops::new_relative_strength_index_transformation(id, s, alloc)
            }
            Procedure::KaufmansAma(s) => ops::new_kaufmans_ama_transformation(id, s, alloc),
            Procedure::Derivative(s) => ops::new_derivative_transformation(id, s, alloc),
            Procedure::Difference(s) => ops::new_difference_transformation(id, s, alloc),
            Procedure::Integral(s) => ops::new_integral_transformation(id, s, alloc),
            Procedure::TimeShift(s) => ops::new_timeshift_transformation(id, s, alloc),
            Procedure::Sum(s) => ops::new_sum_transformation(id, s, alloc),
            Procedure::Count(s) => ops::new_count_transformation(id, s, alloc),
            Procedure::Stddev(s) => ops::new_stddev_transformation(id, s, alloc),
            Procedure::Skew(s) => ops::new_skew_transformation(id, s, alloc),
            Procedure::Quantile(s) => ops::new_quantile_transformation(id, s, alloc),
        }
    }
}

/// Collected output of one run plus its manifest.
#[derive(Debug)]
pub struct RunOutput {
    pub chunks: Vec<Chunk>,
    pub manifest: RunManifest,
}

/// Engine owns the memory budget and numbers the datasets it creates.
pub struct Engine {
    cfg: EngineConfig,
    budget: MemoryBudgetImpl,
    next_id: DatasetId,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        cfg.validate()?;
        let budget = MemoryBudgetImpl::new(cfg.mem_cap_bytes);
        Ok(Self {
            cfg,
            budget,
            next_id: DatasetId::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// The allocator backing every run; callers building input chunks should
    /// allocate from it so the cap covers them too.
    pub fn budget(&self) -> &MemoryBudgetImpl {
        &self.budget
    }

    /// Engine-level defaults filled into the procedure before it is hashed.
    fn resolve(&self, procedure: &Procedure) -> Procedure {
        let mut resolved = procedure.clone();
        if let Procedure::Quantile(spec) = &mut resolved {
            if spec.method == QuantileMethod::EstimateTdigest && spec.compression.is_none() {
                spec.compression = Some(self.cfg.tdigest_compression);
            }
        }
        resolved
    }

    fn split(&self, chunk: Chunk) -> Vec<Chunk> {
        let max = self.cfg.max_chunk_rows;
        if chunk.len() <= max {
            return vec![chunk];
        }
        (0..chunk.len())
            .step_by(max)
            .map(|off| chunk.slice(off, max.min(chunk.len() - off)))
            .collect()
    }

    /// Execute `procedure` over `partitions` and return the collected output.
    pub fn run(&mut self, procedure: &Procedure, partitions: Vec<Partition>) -> Result<RunOutput> {
        let started_ms = now_ms();
        let procedure = self.resolve(procedure);
        let procedure_hash = hash_serde(&procedure)?;

        for (key, chunks) in &partitions {
            if let Some(c) = chunks.iter().find(|c| c.key() != key) {
                return Err(ExecError::Partition(format!(
                    "chunk key {} does not match partition key {}",
                    c.key(),
                    key
                )));
            }
        }

        let mut manifest = RunManifest::new(procedure_hash, started_ms);
        manifest.seed = self.cfg.seed;
        manifest.partitions = partitions.len();
        manifest.inputs_digest = Some(rows_digest(partitions.iter().flat_map(|(_, cs)| cs)));

        self.budget.reset_peak();
        let id = self.next_id;
        self.next_id = id.next();
        let alloc: Arc<dyn Allocator> = Arc::new(self.budget.clone());
        let (mut t, d) = procedure.build(id, alloc)?;
        let sink = CollectingSink::new();
        d.add_transformation(Box::new(sink.clone()))?;

        match self.drive(t.as_mut(), partitions, &mut manifest) {
            Ok(()) => t.finish(None),
            Err(err) => {
                emit_span("abandon", &[("dataset", id.to_string()), ("error", err.to_string())]);
                t.finish(Some(&err));
                return Err(err.into());
            }
        }
        if let Some(err) = sink.finish_error() {
            return Err(err.into());
        }

        let chunks = sink.take_chunks();
        manifest.chunks_out = chunks.len();
        manifest.rows_out = chunks.iter().map(Chunk::len).sum();
        manifest.peak_mem_bytes = self.budget.peak_bytes();
        let manifest = manifest.finish(now_ms(), Some(rows_digest(&chunks)));

        emit_span(
            "run",
            &[
                ("procedure", procedure_hash.to_hex()),
                ("partitions", manifest.partitions.to_string()),
                ("rows_in", manifest.rows_in.to_string()),
                ("rows_out", manifest.rows_out.to_string()),
                ("peak_mem_bytes", manifest.peak_mem_bytes.to_string()),
            ],
        );

        Ok(RunOutput { chunks, manifest })
    }

    fn drive(
        &self,
        t: &mut dyn Transformation,
        partitions: Vec<Partition>,
        manifest: &mut RunManifest,
    ) -> chunkflow_core::Result<()> {
        for (key, chunks) in partitions {
            for chunk in chunks {
                manifest.rows_in += chunk.len();
                for piece in self.split(chunk) {
                    manifest.chunks_in += 1;
                    t.process(piece)?;
                }
            }
            t.flush_key(&key)?;
        }
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
