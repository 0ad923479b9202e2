//! Chunks: bounded, same-schema batches of column buffers sharing one group key.

use std::sync::Arc;

use crate::array::Array;
use crate::budget::Allocator;
use crate::builder::ArrayBuilder;
use crate::error::{Error, Result};
use crate::group_key::GroupKey;
use crate::hash::Hash256;
use crate::schema::{col_index, ColMeta, ColType};
use crate::value::Value;

#[derive(Clone, Debug)]
pub struct Chunk {
    key: GroupKey,
    cols: Arc<[ColMeta]>,
    buffers: Vec<Array>,
    len: usize,
}

impl Chunk {
    /// Invariants: one buffer per column, buffer types match column types,
    /// all buffers share one length.
    pub fn new(key: GroupKey, cols: Vec<ColMeta>, buffers: Vec<Array>) -> Result<Self> {
        if cols.len() != buffers.len() {
            return Err(Error::Invalid(format!(
                "chunk has {} columns but {} buffers",
                cols.len(),
                buffers.len()
            )));
        }
        let len = buffers.first().map_or(0, Array::len);
        for (i, (c, b)) in cols.iter().zip(&buffers).enumerate() {
            if c.ty != b.ty() {
                return Err(Error::Invalid(format!(
                    "column \"{}\" is type {} but its buffer is {}",
                    c.label,
                    c.ty,
                    b.ty()
                )));
            }
            if b.len() != len {
                return Err(Error::Invalid(format!(
                    "column \"{}\" has {} rows, expected {}",
                    c.label,
                    b.len(),
                    len
                )));
            }
            if cols[..i].iter().any(|p| p.label == c.label) {
                return Err(Error::Invalid(format!("duplicate column \"{}\"", c.label)));
            }
        }
        Ok(Self {
            key,
            cols: cols.into(),
            buffers,
            len,
        })
    }

    /// A zero-row chunk that still carries its schema.
    pub fn empty(key: GroupKey, cols: Vec<ColMeta>) -> Self {
        let buffers = cols.iter().map(|c| Array::empty(c.ty)).collect();
        Self {
            key,
            cols: cols.into(),
            buffers,
            len: 0,
        }
    }

    /// Build a chunk from literal rows.
    pub fn from_rows(
        key: GroupKey,
        cols: Vec<ColMeta>,
        rows: &[Vec<Value>],
        alloc: &dyn Allocator,
    ) -> Result<Self> {
        let mut b = ChunkBuilder::new(key, cols, alloc)?;
        b.resize(rows.len())?;
        for row in rows {
            b.append_row(row)?;
        }
        b.finish()
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn col(&self, j: usize) -> &ColMeta {
        &self.cols[j]
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        col_index(&self.cols, label)
    }

    /// Borrowed buffer of column `j`; retain (clone) it to keep it past the call.
    pub fn values(&self, j: usize) -> &Array {
        &self.buffers[j]
    }

    pub fn buffers(&self) -> &[Array] {
        &self.buffers
    }

    /// Checked access to column `j`.
    pub fn column(&self, j: usize) -> Result<(&ColMeta, &Array)> {
        match (self.cols.get(j), self.buffers.get(j)) {
            (Some(c), Some(b)) => Ok((c, b)),
            _ => Err(Error::OutOfRange(format!(
                "column index {j} out of range for chunk with {} columns",
                self.cols.len()
            ))),
        }
    }

    /// Buffer of time column `j`.
    pub fn times(&self, j: usize) -> Result<&Array> {
        let (c, b) = self.column(j)?;
        if c.ty != ColType::Time {
            return Err(Error::FailedPrecondition(format!(
                "column \"{}\" is type {} and not time",
                c.label, c.ty
            )));
        }
        Ok(b)
    }

    /// Keep every buffer of this chunk past the current call.
    pub fn retain(&self) -> Chunk {
        self.clone()
    }

    /// Release a retained chunk.
    pub fn release(self) {}

    /// Zero-copy row window; clamped to the chunk bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Chunk {
        let buffers: Vec<Array> = self.buffers.iter().map(|b| b.slice(offset, len)).collect();
        let len = buffers
            .first()
            .map_or_else(|| len.min(self.len.saturating_sub(offset)), Array::len);
        Chunk {
            key: self.key.clone(),
            cols: Arc::clone(&self.cols),
            buffers,
            len,
        }
    }

    /// Same buffers under a different key.
    pub fn with_key(self, key: GroupKey) -> Chunk {
        Chunk { key, ..self }
    }

    pub fn row(&self, i: usize) -> Vec<Value> {
        self.buffers.iter().map(|b| b.value(i)).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.len).map(|i| self.row(i)).collect()
    }

    pub fn hash_into(&self, h: &mut blake3::Hasher) {
        self.key.hash_into(h);
        for (c, b) in self.cols.iter().zip(&self.buffers) {
            h.update(c.label.as_bytes());
            h.update(&[0]);
            b.hash_into(h);
        }
    }

    /// Stable content hash over key, schema and values.
    pub fn fingerprint(&self) -> Hash256 {
        let mut h = blake3::Hasher::new();
        self.hash_into(&mut h);
        Hash256(h.finalize().into())
    }
}

/// Row-at-a-time chunk assembly.
pub struct ChunkBuilder {
    key: GroupKey,
    cols: Vec<ColMeta>,
    builders: Vec<ArrayBuilder>,
}

impl ChunkBuilder {
    pub fn new(key: GroupKey, cols: Vec<ColMeta>, alloc: &dyn Allocator) -> Result<Self> {
        let builders = cols
            .iter()
            .map(|c| ArrayBuilder::new(c.ty, alloc))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            key,
            cols,
            builders,
        })
    }

    pub fn cols(&self) -> &[ColMeta] {
        &self.cols
    }

    pub fn resize(&mut self, n: usize) -> Result<()> {
        for b in &mut self.builders {
            b.resize(n)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.builders.first().map_or(0, ArrayBuilder::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append_row(&mut self, row: &[Value]) -> Result<()> {
        if row.len() != self.builders.len() {
            return Err(Error::Invalid(format!(
                "row has {} values, expected {}",
                row.len(),
                self.builders.len()
            )));
        }
        for (b, v) in self.builders.iter_mut().zip(row) {
            b.append_value(v)?;
        }
        Ok(())
    }

    /// Direct access to the builder of column `j`.
    pub fn builder(&mut self, j: usize) -> Option<&mut ArrayBuilder> {
        self.builders.get_mut(j)
    }

    pub fn finish(self) -> Result<Chunk> {
        let buffers = self
            .builders
            .into_iter()
            .map(ArrayBuilder::finish)
            .collect::<Result<Vec<_>>>()?;
        Chunk::new(self.key, self.cols, buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_alloc::with_cap;
    use crate::error::ErrorKind;

    #[test]
    fn slicing_shares_buffers_and_keeps_schema() {
        let alloc = with_cap(1 << 20);
        let chunk = Chunk::from_rows(
            GroupKey::empty(),
            vec![
                ColMeta::new("_time", ColType::Time),
                ColMeta::new("_value", ColType::Float),
            ],
            &[
                vec![Value::Time(1), Value::Float(1.0)],
                vec![Value::Time(2), Value::Null],
                vec![Value::Time(3), Value::Float(3.0)],
            ],
            &alloc,
        )
        .expect("chunk");

        let tail = chunk.slice(1, 10);
        assert_eq!(tail.len(), 2);
        assert!(tail.values(1).shares_buffer(chunk.values(1)));
        assert_eq!(tail.row(0), vec![Value::Time(2), Value::Null]);
        assert_eq!(chunk.column_index("_value"), Some(1));
        assert!(chunk.times(0).is_ok());
        assert_eq!(
            chunk.times(1).expect_err("not time").kind(),
            ErrorKind::FailedPrecondition
        );
        assert_eq!(
            chunk.column(5).expect_err("oob").kind(),
            ErrorKind::OutOfRange
        );

        let before = alloc.used_bytes();
        assert!(before > 0);
        drop(chunk);
        assert_eq!(alloc.used_bytes(), before);
        drop(tail);
        assert_eq!(alloc.used_bytes(), 0);
    }

    #[test]
    fn rejects_ragged_buffers() {
        let alloc = with_cap(1 << 20);
        let a = Chunk::from_rows(
            GroupKey::empty(),
            vec![ColMeta::new("a", ColType::Int)],
            &[vec![Value::Int(1)], vec![Value::Int(2)]],
            &alloc,
        )
        .expect("a");
        let err = Chunk::new(
            GroupKey::empty(),
            vec![ColMeta::new("a", ColType::Int), ColMeta::new("b", ColType::Int)],
            vec![a.values(0).clone(), a.values(0).slice(0, 1)],
        )
        .expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
