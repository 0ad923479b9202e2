#![forbid(unsafe_code)]
//! chunkflow-exec: drives partitions through a transformation and records a
//! RunManifest for every run.
//!
//! Execution is sequential. Parallelism belongs to the caller, who can run one
//! engine per independent stream.

pub mod metrics;
pub mod runtime;

pub use runtime::{Engine, ExecError, Partition, Procedure, RunOutput};
