//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chunkflow_core::prelude::*;
use chunkflow_mem::MemoryBudgetImpl;
use chunkflow_operators::dataset::{CollectingSink, TransportDataset};
use chunkflow_operators::traits::Transformation;

pub const SEC: i64 = 1_000_000_000;

pub type Built = Result<(Box<dyn Transformation>, TransportDataset)>;

pub fn budget() -> MemoryBudgetImpl {
    MemoryBudgetImpl::new(64 * 1024 * 1024)
}

pub fn host_key(host: &str) -> GroupKey {
    GroupKey::new(
        vec![ColMeta::new("host", ColType::String)],
        vec![Value::from(host)],
    )
    .expect("key")
}

/// `_time` plus `_value` of type `ty`.
pub fn series_cols(ty: ColType) -> Vec<ColMeta> {
    vec![
        ColMeta::new(DEFAULT_TIME_LABEL, ColType::Time),
        ColMeta::new(DEFAULT_VALUE_LABEL, ty),
    ]
}

/// A `_time`/`_value` float series at one-second steps.
pub fn float_series(key: &GroupKey, values: &[Option<f64>], budget: &MemoryBudgetImpl) -> Chunk {
    let rows: Vec<Vec<Value>> = values
        .iter()
        .enumerate()
        .map(|(i, v)| vec![Value::Time(i as i64 * SEC), Value::from(*v)])
        .collect();
    Chunk::from_rows(key.clone(), series_cols(ColType::Float), &rows, budget).expect("chunk")
}

pub fn int_series(key: &GroupKey, values: &[Option<i64>], budget: &MemoryBudgetImpl) -> Chunk {
    let rows: Vec<Vec<Value>> = values
        .iter()
        .enumerate()
        .map(|(i, v)| vec![Value::Time(i as i64 * SEC), Value::from(*v)])
        .collect();
    Chunk::from_rows(key.clone(), series_cols(ColType::Int), &rows, budget).expect("chunk")
}

/// Every chunk split into one-row slices.
pub fn one_row_chunks(chunks: &[Chunk]) -> Vec<Chunk> {
    chunks
        .iter()
        .flat_map(|c| (0..c.len()).map(move |i| c.slice(i, 1)))
        .collect()
}

/// Drive `chunks` through a freshly built transformation, flushing each key
/// when the next one starts, and collect what comes out.
pub fn apply(
    build: impl FnOnce(Arc<dyn Allocator>) -> Built,
    chunks: Vec<Chunk>,
    budget: &MemoryBudgetImpl,
) -> Result<Vec<Chunk>> {
    let (mut t, d) = build(Arc::new(budget.clone()))?;
    let sink = CollectingSink::new();
    d.add_transformation(Box::new(sink.clone()))?;

    let mut current: Option<GroupKey> = None;
    for chunk in chunks {
        if let Some(prev) = current.as_ref().filter(|k| *k != chunk.key()) {
            t.flush_key(prev)?;
        }
        current = Some(chunk.key().clone());
        if let Err(e) = t.process(chunk) {
            t.finish(Some(&e));
            return Err(e);
        }
    }
    if let Some(last) = current {
        t.flush_key(&last)?;
    }
    t.finish(None);
    match sink.finish_error() {
        Some(e) => Err(e),
        None => Ok(sink.take_chunks()),
    }
}

/// All values of column `label` across `chunks`, widened to f64.
pub fn column_f64(chunks: &[Chunk], label: &str) -> Vec<Option<f64>> {
    chunks
        .iter()
        .flat_map(|c| {
            let j = c.column_index(label).expect("column");
            (0..c.len()).map(move |i| c.values(j).f64_at(i))
        })
        .collect()
}

pub fn column_values(chunks: &[Chunk], label: &str) -> Vec<Value> {
    chunks
        .iter()
        .flat_map(|c| {
            let j = c.column_index(label).expect("column");
            (0..c.len()).map(move |i| c.values(j).value(i))
        })
        .collect()
}

pub fn rows(chunks: &[Chunk]) -> Vec<Vec<Value>> {
    chunks.iter().flat_map(Chunk::to_rows).collect()
}

pub fn assert_close(got: &[Option<f64>], want: &[Option<f64>]) {
    assert_eq!(got.len(), want.len(), "got {got:?}, want {want:?}");
    for (g, w) in got.iter().zip(want) {
        match (g, w) {
            (Some(g), Some(w)) if w.is_nan() => assert!(g.is_nan(), "got {got:?}, want {want:?}"),
            (Some(g), Some(w)) => assert!((g - w).abs() < 1e-9, "got {got:?}, want {want:?}"),
            (None, None) => {}
            _ => panic!("got {got:?}, want {want:?}"),
        }
    }
}
