//! Transformation contracts.
//!
//! The pipeline drives every stage through [`Transformation`]: one call per
//! chunk, then key flushes, watermarks and a final `finish`. Algorithms do not
//! implement it directly. They implement one of the narrow contracts below and
//! are wrapped by the generic adapters in [`crate::adapter`]:
//!
//! - [`NarrowTransformation`]: output for a chunk depends on that chunk only.
//! - [`NarrowStateTransformation`]: output also depends on state carried across
//!   the chunks of one partition key.
//!
//! Invariants:
//! - Chunks of one partition key arrive contiguously, never interleaved with
//!   another key's chunks.
//! - Everything is driven synchronously from one thread per pipeline.
//! - Buffers kept beyond a call are retained (cloned) and released (dropped)
//!   no later than partition end.

use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;

use crate::dataset::TransportDataset;

/// Message-driven surface of a pipeline stage.
pub trait Transformation: Send {
    /// Human-readable operation name (stable).
    fn name(&self) -> &'static str;

    fn process(&mut self, chunk: Chunk) -> Result<()>;

    /// The partition identified by `key` has ended.
    fn flush_key(&mut self, key: &GroupKey) -> Result<()>;

    fn retract(&mut self, key: &GroupKey) -> Result<()>;

    fn update_watermark(&mut self, mark: i64) -> Result<()>;

    /// No more input. `err` is set when upstream failed; pending state must
    /// then be abandoned rather than finalized.
    fn finish(&mut self, err: Option<&Error>);
}

/// Stateless per-chunk transformation.
pub trait NarrowTransformation: Send {
    fn name(&self) -> &'static str;

    /// Emit zero or more chunks derived from `chunk` into `d`.
    fn process(&mut self, chunk: Chunk, d: &TransportDataset, alloc: &dyn Allocator)
        -> Result<()>;

    /// Key under which output for input `key` is emitted; flushes and
    /// retractions are forwarded under it.
    fn output_key(&self, key: &GroupKey) -> Result<GroupKey> {
        Ok(key.clone())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-partition state of a [`NarrowStateTransformation`].
pub trait PartitionState: Send {
    /// Called once the partition has ended normally. Emits any best-effort
    /// output and releases retained buffers. Must be idempotent.
    fn finish(
        &mut self,
        _key: &GroupKey,
        _d: &TransportDataset,
        _alloc: &dyn Allocator,
    ) -> Result<()> {
        Ok(())
    }
}

/// Stateful per-chunk transformation.
///
/// `state` is `None` on the first chunk of a partition. The returned state is
/// threaded into the next call for the same key; the bool reports whether a
/// chunk was emitted. On error the state is dropped and the partition aborts.
pub trait NarrowStateTransformation: Send {
    type State: PartitionState;

    fn name(&self) -> &'static str;

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<Self::State>,
        d: &TransportDataset,
        alloc: &dyn Allocator,
    ) -> Result<(Self::State, bool)>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
