//! Run manifest for audit and chunk-invariance comparisons.
//!
//! The engine emits a manifest after every run. Two runs over the same rows with
//! the same procedure produce equal `procedure_hash`, `inputs_digest` and
//! `outputs_digest` no matter how the input was chunked.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: ManifestId,

    /// Stable hash of the procedure (algorithm and its parameters).
    pub procedure_hash: Hash256,

    /// Engine version string for provenance.
    pub engine_version: String,

    pub seed: Option<u64>,

    pub inputs_digest: Option<Hash256>,
    pub outputs_digest: Option<Hash256>,

    pub partitions: usize,
    pub rows_in: usize,
    pub rows_out: usize,
    pub chunks_in: usize,
    pub chunks_out: usize,

    /// Highest allocator usage observed during the run.
    pub peak_mem_bytes: usize,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(procedure_hash: Hash256, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            procedure_hash,
            engine_version: crate::VERSION.to_string(),
            seed: None,
            inputs_digest: None,
            outputs_digest: None,
            partitions: 0,
            rows_in: 0,
            rows_out: 0,
            chunks_in: 0,
            chunks_out: 0,
            peak_mem_bytes: 0,
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64, outputs_digest: Option<Hash256>) -> Self {
        self.finished_ms = finished_ms;
        self.outputs_digest = outputs_digest;
        self
    }

    /// Whether two runs agree on procedure, inputs and outputs.
    pub fn same_results(&self, other: &RunManifest) -> bool {
        self.procedure_hash == other.procedure_hash
            && self.inputs_digest == other.inputs_digest
            && self.outputs_digest == other.outputs_digest
    }
}
