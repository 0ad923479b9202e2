//! Partition lifecycle of the narrow-state adapter: begin, finalize, abandon,
//! retract, and the memory it leaves behind.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chunkflow_core::prelude::*;
use chunkflow_operators::dataset::{CollectingSink, TransportDataset};
use chunkflow_operators::plan::*;
use chunkflow_operators::traits::{NarrowStateTransformation, PartitionState, Transformation};
use chunkflow_operators::*;

use common::*;

#[derive(Default)]
struct Counters {
    begun: AtomicUsize,
    finalized: AtomicUsize,
    dropped: AtomicUsize,
    closed: AtomicUsize,
}

struct TallyState {
    rows: usize,
    counters: Arc<Counters>,
}

impl PartitionState for TallyState {
    fn finish(&mut self, key: &GroupKey, d: &TransportDataset, alloc: &dyn Allocator) -> Result<()> {
        self.counters.finalized.fetch_add(1, Ordering::SeqCst);
        let cols = vec![ColMeta::new("rows", ColType::Int)];
        let chunk = Chunk::from_rows(key.clone(), cols, &[vec![Value::Int(self.rows as i64)]], alloc)?;
        d.process(chunk)
    }
}

impl Drop for TallyState {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts rows per partition and fails on a chunk with a column named "boom".
struct Tally {
    counters: Arc<Counters>,
}

impl NarrowStateTransformation for Tally {
    type State = TallyState;

    fn name(&self) -> &'static str {
        "tally"
    }

    fn process(
        &mut self,
        chunk: Chunk,
        state: Option<TallyState>,
        _d: &TransportDataset,
        _alloc: &dyn Allocator,
    ) -> Result<(TallyState, bool)> {
        if chunk.column_index("boom").is_some() {
            return Err(Error::FailedPrecondition("boom".into()));
        }
        let mut st = state.unwrap_or_else(|| {
            self.counters.begun.fetch_add(1, Ordering::SeqCst);
            TallyState {
                rows: 0,
                counters: Arc::clone(&self.counters),
            }
        });
        st.rows += chunk.len();
        Ok((st, false))
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn tally(budget: &chunkflow_mem::MemoryBudgetImpl) -> (Box<dyn Transformation>, CollectingSink, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let (t, d) = new_narrow_state_transformation(
        DatasetId::new(3),
        Tally {
            counters: Arc::clone(&counters),
        },
        Arc::new(budget.clone()),
    );
    let sink = CollectingSink::new();
    d.add_transformation(Box::new(sink.clone())).expect("attach");
    (t, sink, counters)
}

#[test]
fn key_change_finalizes_previous_partition() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    let a = host_key("a");
    let z = host_key("z");

    t.process(float_series(&a, &[Some(1.0), Some(2.0)], &b)).expect("a");
    t.process(float_series(&a, &[Some(3.0)], &b)).expect("a");
    assert!(sink.rows().is_empty());

    t.process(float_series(&z, &[Some(4.0)], &b)).expect("z");
    assert_eq!(sink.rows(), vec![vec![Value::Int(3)]]);
    assert_eq!(sink.flushed_keys(), vec![a]);

    t.finish(None);
    assert_eq!(sink.rows(), vec![vec![Value::Int(3)], vec![Value::Int(1)]]);
    assert_eq!(sink.flushed_keys().len(), 2);
    assert!(sink.is_finished());
    assert_eq!(sink.finish_error(), None);

    assert_eq!(counters.begun.load(Ordering::SeqCst), 2);
    assert_eq!(counters.finalized.load(Ordering::SeqCst), 2);
    assert_eq!(counters.dropped.load(Ordering::SeqCst), 2);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn finish_is_idempotent() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    t.process(float_series(&host_key("a"), &[Some(1.0)], &b)).expect("a");
    t.finish(None);
    t.finish(None);
    t.finish(Some(&Error::Internal("late".into())));
    assert_eq!(sink.rows().len(), 1);
    assert_eq!(counters.finalized.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    assert_eq!(sink.finish_error(), None);
}

#[test]
fn finish_with_error_abandons_pending_state() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    t.process(float_series(&host_key("a"), &[Some(1.0)], &b)).expect("a");

    let err = Error::Internal("upstream failed".into());
    t.finish(Some(&err));
    assert!(sink.rows().is_empty());
    assert_eq!(sink.finish_error(), Some(err));
    assert_eq!(counters.finalized.load(Ordering::SeqCst), 0);
    assert_eq!(counters.dropped.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn processing_error_drops_the_partition() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    let key = host_key("a");
    t.process(float_series(&key, &[Some(1.0)], &b)).expect("a");

    let boom = Chunk::from_rows(
        key,
        vec![ColMeta::new("boom", ColType::Int)],
        &[vec![Value::Int(1)]],
        &b,
    )
    .expect("chunk");
    let err = t.process(boom).err().expect("boom");
    assert_eq!(counters.dropped.load(Ordering::SeqCst), 1);

    t.finish(Some(&err));
    assert!(sink.rows().is_empty());
    assert_eq!(counters.finalized.load(Ordering::SeqCst), 0);
}

#[test]
fn retract_discards_state_and_forwards() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    let key = host_key("a");
    t.process(float_series(&key, &[Some(1.0)], &b)).expect("a");
    t.retract(&key).expect("retract");
    t.finish(None);
    assert!(sink.rows().is_empty());
    assert_eq!(sink.retracted_keys(), vec![key]);
    assert_eq!(counters.dropped.load(Ordering::SeqCst), 1);
    assert_eq!(counters.finalized.load(Ordering::SeqCst), 0);
}

#[test]
fn key_seen_again_after_flush_is_a_new_partition() {
    let b = budget();
    let (mut t, sink, counters) = tally(&b);
    let key = host_key("a");
    t.process(float_series(&key, &[Some(1.0), Some(2.0)], &b)).expect("a");
    t.flush_key(&key).expect("flush");
    t.process(float_series(&key, &[Some(3.0)], &b)).expect("a again");
    t.finish(None);
    assert_eq!(sink.rows(), vec![vec![Value::Int(2)], vec![Value::Int(1)]]);
    assert_eq!(counters.begun.load(Ordering::SeqCst), 2);
}

#[test]
fn watermark_is_forwarded() {
    let b = budget();
    let (mut t, sink, _) = tally(&b);
    t.update_watermark(42).expect("watermark");
    assert_eq!(sink.watermark(), Some(42));
}

#[test]
fn abandoned_window_state_frees_retained_buffers() {
    let b = budget();
    let (mut t, d) = new_moving_average_transformation(
        DatasetId::new(1),
        &PeriodSpec::new(10),
        Arc::new(b.clone()),
    )
    .expect("build");
    let sink = CollectingSink::new();
    d.add_transformation(Box::new(sink.clone())).expect("attach");

    t.process(float_series(&host_key("a"), &[Some(1.0), Some(2.0)], &b))
        .expect("process");
    assert!(b.used_bytes() > 0, "the last row is retained while priming");

    t.finish(Some(&Error::Internal("cancelled".into())));
    assert!(sink.chunks().is_empty());
    assert_eq!(b.used_bytes(), 0);
}

#[test]
fn completed_runs_leave_only_their_output() {
    let b = budget();
    let key = host_key("a");
    let input = float_series(&key, &[Some(1.0), Some(2.0), Some(3.0)], &b);
    let out = apply(
        |a| new_exponential_moving_average_transformation(DatasetId::new(1), &PeriodSpec::new(2), a),
        vec![input],
        &b,
    )
    .expect("run");
    assert!(b.used_bytes() > 0);
    drop(out);
    assert_eq!(b.used_bytes(), 0);

    let out = apply(
        |a| new_sum_transformation(DatasetId::new(1), &AggregateSpec::default(), a),
        vec![float_series(&key, &[Some(1.0)], &b)],
        &b,
    )
    .expect("run");
    drop(out);
    assert_eq!(b.used_bytes(), 0);
}

#[test]
fn fan_out_shares_buffers() {
    let b = budget();
    let (mut t, d) = new_timeshift_transformation(
        DatasetId::new(2),
        &TimeShiftSpec::new(0),
        Arc::new(b.clone()),
    )
    .expect("build");
    let first = CollectingSink::new();
    let second = CollectingSink::new();
    d.add_transformation(Box::new(first.clone())).expect("attach");
    d.add_transformation(Box::new(second.clone())).expect("attach");
    assert_eq!(d.downstream_len(), 2);

    t.process(float_series(&host_key("a"), &[Some(1.0)], &b)).expect("process");
    let (x, y) = (first.chunks(), second.chunks());
    assert_eq!(x.len(), 1);
    assert!(x[0].values(1).shares_buffer(y[0].values(1)));
}
