//! Convenient re-exports for downstream crates.

pub use crate::array::Array;
pub use crate::budget::{Allocator, BudgetGuard, MemoryBudget};
pub use crate::builder::{
    ArrayBuilder, BoolBuilder, FloatBuilder, IntBuilder, StringBuilder, TimeBuilder, UIntBuilder,
};
pub use crate::chunk::{Chunk, ChunkBuilder};
pub use crate::config::EngineConfig;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::group_key::GroupKey;
pub use crate::hash::Hash256;
pub use crate::id::DatasetId;
pub use crate::manifest::{ManifestId, RunManifest};
pub use crate::schema::{ColMeta, ColType, DEFAULT_TIME_LABEL, DEFAULT_VALUE_LABEL};
pub use crate::value::Value;
