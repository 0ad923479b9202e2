//! Generic adapters from the narrow contracts to [`Transformation`].

use std::sync::Arc;

use chunkflow_core::budget::Allocator;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;

use crate::dataset::TransportDataset;
use crate::traits::{
    NarrowStateTransformation, NarrowTransformation, PartitionState, Transformation,
};

/// Wraps a stateless [`NarrowTransformation`].
pub struct NarrowAdapter<T> {
    inner: T,
    d: TransportDataset,
    alloc: Arc<dyn Allocator>,
    closed: bool,
}

impl<T: NarrowTransformation> NarrowAdapter<T> {
    pub fn new(inner: T, d: TransportDataset, alloc: Arc<dyn Allocator>) -> Self {
        Self {
            inner,
            d,
            alloc,
            closed: false,
        }
    }
}

impl<T: NarrowTransformation> Transformation for NarrowAdapter<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn process(&mut self, chunk: Chunk) -> Result<()> {
        self.inner.process(chunk, &self.d, self.alloc.as_ref())
    }

    fn flush_key(&mut self, key: &GroupKey) -> Result<()> {
        self.d.flush_key(&self.inner.output_key(key)?)
    }

    fn retract(&mut self, key: &GroupKey) -> Result<()> {
        self.d.retract(&self.inner.output_key(key)?)
    }

    fn update_watermark(&mut self, mark: i64) -> Result<()> {
        self.d.update_watermark(mark)
    }

    fn finish(&mut self, err: Option<&Error>) {
        if self.closed {
            return;
        }
        self.closed = true;
        let close_err = self.inner.close().err();
        self.d.finish(err.or(close_err.as_ref()));
    }
}

/// Build a stateless transformation and the dataset it writes to.
pub fn new_narrow_transformation<T: NarrowTransformation + 'static>(
    id: DatasetId,
    t: T,
    alloc: Arc<dyn Allocator>,
) -> (Box<dyn Transformation>, TransportDataset) {
    let d = TransportDataset::new(id);
    (Box::new(NarrowAdapter::new(t, d.clone(), alloc)), d)
}

/// Wraps a [`NarrowStateTransformation`], owning the state of the partition
/// currently being processed.
pub struct NarrowStateAdapter<T: NarrowStateTransformation> {
    inner: T,
    d: TransportDataset,
    alloc: Arc<dyn Allocator>,
    current: Option<(GroupKey, T::State)>,
    closed: bool,
}

impl<T: NarrowStateTransformation> NarrowStateAdapter<T> {
    pub fn new(inner: T, d: TransportDataset, alloc: Arc<dyn Allocator>) -> Self {
        Self {
            inner,
            d,
            alloc,
            current: None,
            closed: false,
        }
    }

    pub fn has_pending_state(&self) -> bool {
        self.current.is_some()
    }

    /// Finalize the pending partition and announce its end downstream.
    fn end_partition(&mut self) -> Result<()> {
        let Some((key, mut state)) = self.current.take() else {
            return Ok(());
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(op = self.inner.name(), key = %key, "partition finalize");
        let res = state.finish(&key, &self.d, self.alloc.as_ref());
        drop(state);
        res?;
        self.d.flush_key(&key)
    }

    fn abandon(&mut self) {
        if let Some((_key, state)) = self.current.take() {
            #[cfg(feature = "tracing")]
            tracing::debug!(op = self.inner.name(), key = %_key, "partition abandoned");
            drop(state);
        }
    }
}

impl<T: NarrowStateTransformation> Transformation for NarrowStateAdapter<T> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn process(&mut self, chunk: Chunk) -> Result<()> {
        let same_key = matches!(&self.current, Some((k, _)) if k == chunk.key());
        if !same_key {
            self.end_partition()?;
            #[cfg(feature = "tracing")]
            tracing::debug!(op = self.inner.name(), key = %chunk.key(), "partition begin");
        }
        let key = chunk.key().clone();
        let prev = self.current.take().map(|(_, s)| s);
        // On error the state is gone with `prev`; the partition is aborted.
        let (state, _emitted) = self
            .inner
            .process(chunk, prev, &self.d, self.alloc.as_ref())?;
        self.current = Some((key, state));
        Ok(())
    }

    fn flush_key(&mut self, key: &GroupKey) -> Result<()> {
        if matches!(&self.current, Some((k, _)) if k == key) {
            self.end_partition()
        } else {
            self.d.flush_key(key)
        }
    }

    fn retract(&mut self, key: &GroupKey) -> Result<()> {
        if matches!(&self.current, Some((k, _)) if k == key) {
            self.current = None;
        }
        self.d.retract(key)
    }

    fn update_watermark(&mut self, mark: i64) -> Result<()> {
        self.d.update_watermark(mark)
    }

    fn finish(&mut self, err: Option<&Error>) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut first: Option<Error> = None;
        match err {
            Some(_) => self.abandon(),
            None => first = self.end_partition().err(),
        }
        if let Err(e) = self.inner.close() {
            first.get_or_insert(e);
        }
        self.d.finish(err.or(first.as_ref()));
    }
}

/// Build a stateful transformation and the dataset it writes to.
pub fn new_narrow_state_transformation<T: NarrowStateTransformation + 'static>(
    id: DatasetId,
    t: T,
    alloc: Arc<dyn Allocator>,
) -> (Box<dyn Transformation>, TransportDataset) {
    let d = TransportDataset::new(id);
    (Box::new(NarrowStateAdapter::new(t, d.clone(), alloc)), d)
}
