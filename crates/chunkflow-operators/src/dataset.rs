//! Output side of a transformation: a fan-out handle to downstream stages.

use std::sync::{Arc, Mutex, MutexGuard};

use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::group_key::GroupKey;
use chunkflow_core::id::DatasetId;

use crate::traits::Transformation;

type Downstream = Vec<Box<dyn Transformation>>;

/// Cloneable handle that forwards every message to the attached downstream
/// transformations, in attachment order.
#[derive(Clone)]
pub struct TransportDataset {
    id: DatasetId,
    downstream: Arc<Mutex<Downstream>>,
}

impl TransportDataset {
    pub fn new(id: DatasetId) -> Self {
        Self {
            id,
            downstream: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn add_transformation(&self, t: Box<dyn Transformation>) -> Result<()> {
        self.lock()?.push(t);
        Ok(())
    }

    pub fn downstream_len(&self) -> usize {
        self.lock().map_or(0, |d| d.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Downstream>> {
        self.downstream
            .lock()
            .map_err(|_| Error::Internal(format!("dataset {} downstream lock poisoned", self.id)))
    }

    /// Every downstream receives its own retained handle to the chunk.
    pub fn process(&self, chunk: Chunk) -> Result<()> {
        let mut down = self.lock()?;
        if let Some((last, rest)) = down.split_last_mut() {
            for t in rest {
                t.process(chunk.retain())?;
            }
            last.process(chunk)?;
        }
        Ok(())
    }

    pub fn flush_key(&self, key: &GroupKey) -> Result<()> {
        for t in self.lock()?.iter_mut() {
            t.flush_key(key)?;
        }
        Ok(())
    }

    pub fn retract(&self, key: &GroupKey) -> Result<()> {
        for t in self.lock()?.iter_mut() {
            t.retract(key)?;
        }
        Ok(())
    }

    pub fn update_watermark(&self, mark: i64) -> Result<()> {
        for t in self.lock()?.iter_mut() {
            t.update_watermark(mark)?;
        }
        Ok(())
    }

    pub fn finish(&self, err: Option<&Error>) {
        // A poisoned list has nothing left worth finishing.
        if let Ok(mut down) = self.lock() {
            for t in down.iter_mut() {
                t.finish(err);
            }
        }
    }
}

#[derive(Default)]
struct Collected {
    chunks: Vec<Chunk>,
    flushed: Vec<GroupKey>,
    retracted: Vec<GroupKey>,
    watermark: Option<i64>,
    finished: bool,
    error: Option<Error>,
}

/// Terminal transformation that records everything it receives.
///
/// Clones share the same record, so one handle can be attached downstream
/// while another is kept for inspection.
#[derive(Clone, Default)]
pub struct CollectingSink {
    inner: Arc<Mutex<Collected>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collected>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("collecting sink lock poisoned".into()))
    }

    fn read<R: Default>(&self, f: impl FnOnce(&Collected) -> R) -> R {
        self.lock().map(|c| f(&c)).unwrap_or_default()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.read(|c| c.chunks.clone())
    }

    /// Take the collected chunks, releasing the sink's references.
    pub fn take_chunks(&self) -> Vec<Chunk> {
        self.lock()
            .map(|mut c| std::mem::take(&mut c.chunks))
            .unwrap_or_default()
    }

    /// All collected rows, in arrival order.
    pub fn rows(&self) -> Vec<Vec<chunkflow_core::value::Value>> {
        self.read(|c| c.chunks.iter().flat_map(Chunk::to_rows).collect())
    }

    pub fn flushed_keys(&self) -> Vec<GroupKey> {
        self.read(|c| c.flushed.clone())
    }

    pub fn retracted_keys(&self) -> Vec<GroupKey> {
        self.read(|c| c.retracted.clone())
    }

    pub fn watermark(&self) -> Option<i64> {
        self.read(|c| c.watermark)
    }

    pub fn is_finished(&self) -> bool {
        self.read(|c| c.finished)
    }

    pub fn finish_error(&self) -> Option<Error> {
        self.read(|c| c.error.clone())
    }
}

impl Transformation for CollectingSink {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn process(&mut self, chunk: Chunk) -> Result<()> {
        self.lock()?.chunks.push(chunk);
        Ok(())
    }

    fn flush_key(&mut self, key: &GroupKey) -> Result<()> {
        self.lock()?.flushed.push(key.clone());
        Ok(())
    }

    fn retract(&mut self, key: &GroupKey) -> Result<()> {
        let mut c = self.lock()?;
        c.chunks.retain(|ch| ch.key() != key);
        c.retracted.push(key.clone());
        Ok(())
    }

    fn update_watermark(&mut self, mark: i64) -> Result<()> {
        self.lock()?.watermark = Some(mark);
        Ok(())
    }

    fn finish(&mut self, err: Option<&Error>) {
        if let Ok(mut c) = self.lock() {
            c.finished = true;
            c.error = err.cloned();
        }
    }
}
