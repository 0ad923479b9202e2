//! Building blocks shared by the stateful algorithms.

use std::collections::HashMap;

use chunkflow_core::array::Array;
use chunkflow_core::chunk::Chunk;
use chunkflow_core::error::{Error, Result};
use chunkflow_core::schema::{ColMeta, ColType};

use crate::dataset::TransportDataset;

/// Counts rows a window still needs before it produces output.
#[derive(Debug, Clone)]
pub struct Priming {
    deficit: usize,
    seen: usize,
}

impl Priming {
    pub fn new(deficit: usize) -> Self {
        Self { deficit, seen: 0 }
    }

    /// Account for `len` more rows; returns the index of the first row in
    /// this batch that is past the deficit (`len` when none is).
    pub fn consume(&mut self, len: usize) -> usize {
        let offset = self.deficit.saturating_sub(self.seen).min(len);
        self.seen = self.seen.saturating_add(len);
        offset
    }

    /// At least one row has been produced.
    pub fn has_output(&self) -> bool {
        self.seen > self.deficit
    }

    pub fn rows_seen(&self) -> usize {
        self.seen
    }
}

/// Remembers the input type of every target column of a partition.
#[derive(Debug, Default, Clone)]
pub struct SchemaLock {
    types: HashMap<String, ColType>,
}

impl SchemaLock {
    pub fn check(&mut self, col: &ColMeta) -> Result<()> {
        match self.types.get(&col.label) {
            Some(&was) if was != col.ty => Err(Error::schema_collision(&col.label, was, col.ty)),
            Some(_) => Ok(()),
            None => {
                self.types.insert(col.label.clone(), col.ty);
                Ok(())
            }
        }
    }

    pub fn type_of(&self, label: &str) -> Option<ColType> {
        self.types.get(label).copied()
    }
}

/// Assemble and emit a chunk from `chunk` with rows before `offset` dropped.
///
/// `replaced` holds computed buffers (already `len - offset` rows) by column
/// index; every other column is a zero-copy slice of the input. Returns
/// whether anything was emitted.
pub fn emit_replacing(
    chunk: &Chunk,
    offset: usize,
    mut replaced: Vec<(usize, Array)>,
    d: &TransportDataset,
) -> Result<bool> {
    let out_len = chunk.len().saturating_sub(offset);
    if out_len == 0 && !chunk.is_empty() {
        return Ok(false);
    }
    let mut cols = Vec::with_capacity(chunk.num_cols());
    let mut buffers = Vec::with_capacity(chunk.num_cols());
    for (j, col) in chunk.cols().iter().enumerate() {
        match replaced.iter().position(|(k, _)| *k == j) {
            Some(p) => {
                let (_, arr) = replaced.swap_remove(p);
                cols.push(col.with_type(arr.ty()));
                buffers.push(arr);
            }
            None => {
                cols.push(col.clone());
                buffers.push(chunk.values(j).slice(offset, out_len));
            }
        }
    }
    let out = Chunk::new(chunk.key().clone(), cols, buffers)?;
    d.process(out)?;
    Ok(true)
}

/// Looks up the columns an algorithm targets, in chunk order.
pub fn target_indices(chunk: &Chunk, labels: &[String]) -> Vec<usize> {
    chunk
        .cols()
        .iter()
        .enumerate()
        .filter(|(_, c)| labels.iter().any(|l| *l == c.label))
        .map(|(j, _)| j)
        .collect()
}
