//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard memory cap (in bytes) for every buffer the pipeline allocates.
    pub mem_cap_bytes: usize,

    /// Input chunks longer than this are split (zero copy) before delivery.
    pub max_chunk_rows: usize,

    /// Compression used by `estimate_tdigest` quantiles that do not set one.
    pub tdigest_compression: f64,

    /// Optional seed recorded in the manifest for reproducible test inputs.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            max_chunk_rows: 1024,
            tdigest_compression: 1000.0,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CHUNKFLOW_MEM_CAP_BYTES`: memory cap in bytes
    /// - `CHUNKFLOW_MAX_CHUNK_ROWS`: split threshold for input chunks
    /// - `CHUNKFLOW_TDIGEST_COMPRESSION`: default t-digest compression
    /// - `CHUNKFLOW_SEED`: seed recorded in manifests
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` with an injectable lookup (tests avoid the process env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("CHUNKFLOW_MEM_CAP_BYTES").and_then(|s| s.parse::<usize>().ok()) {
            cfg.mem_cap_bytes = v;
        }

        if let Some(v) = lookup("CHUNKFLOW_MAX_CHUNK_ROWS").and_then(|s| s.parse::<usize>().ok()) {
            cfg.max_chunk_rows = v;
        }

        if let Some(v) =
            lookup("CHUNKFLOW_TDIGEST_COMPRESSION").and_then(|s| s.parse::<f64>().ok())
        {
            cfg.tdigest_compression = v;
        }

        if let Some(v) = lookup("CHUNKFLOW_SEED").and_then(|s| s.parse::<u64>().ok()) {
            cfg.seed = Some(v);
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.mem_cap_bytes == 0 {
            return Err(Error::Invalid("mem_cap_bytes must be > 0".into()));
        }
        if self.max_chunk_rows == 0 {
            return Err(Error::Invalid("max_chunk_rows must be > 0".into()));
        }
        if !(self.tdigest_compression > 0.0) {
            return Err(Error::Invalid(format!(
                "tdigest_compression must be > 0, got {}",
                self.tdigest_compression
            )));
        }
        Ok(())
    }
}
