//! Arrays, builders and chunks against a real memory budget.

mod common;

use chunkflow_core::hash::rows_digest;
use chunkflow_core::prelude::*;

use common::*;

#[test]
fn builders_track_nulls_and_widen_numbers() {
    let b = budget();
    let mut ints = IntBuilder::new(&b).expect("builder");
    ints.resize(3).expect("resize");
    ints.append(4);
    ints.append_null();
    ints.append_option(Some(-2));
    let ints = ints.finish().expect("finish");

    assert_eq!(ints.len(), 3);
    assert_eq!(ints.null_count(), 1);
    assert_eq!(ints.f64_at(0), Some(4.0));
    assert_eq!(ints.f64_at(1), None);
    assert_eq!(ints.value(1), Value::Null);
    assert_eq!(ints.value(9), Value::Null);
    assert!(ints.accounted_bytes() > 0);

    let tail = ints.slice(1, 2);
    assert_eq!(tail.null_count(), 1);
    assert_eq!(tail.f64_at(1), Some(-2.0));

    let mut strings = StringBuilder::new(&b).expect("builder");
    strings.append("cpu".to_string());
    let strings = strings.finish().expect("finish");
    assert_eq!(strings.f64_at(0), None);
    assert_eq!(strings.value(0), Value::from("cpu"));
}

#[test]
fn dynamic_builder_rejects_mismatched_values() {
    let b = budget();
    let mut builder = ArrayBuilder::new(ColType::Float, &b).expect("builder");
    builder.append_value(&Value::Float(1.5)).expect("float");
    builder.append_value(&Value::Null).expect("null");
    let err = builder.append_value(&Value::Int(1)).expect_err("int into float");
    assert_eq!(err.kind(), ErrorKind::Invalid);

    let ints = Array::nulls(ColType::Int, 2, &b).expect("nulls");
    let err = builder.append_from(&ints, 0).expect_err("type");
    assert_eq!(err.kind(), ErrorKind::Invalid);

    let arr = builder.finish().expect("finish");
    assert_eq!(arr.len(), 2);
    assert_eq!(arr.null_count(), 1);
}

#[test]
fn from_rows_keeps_order_and_nulls() {
    let b = budget();
    let key = host_key("a");
    let chunk = float_series(&key, &[Some(1.0), None, Some(3.0)], &b);
    assert_eq!(chunk.key(), &key);
    assert_eq!(chunk.num_cols(), 2);
    assert_eq!(
        chunk.to_rows(),
        vec![
            vec![Value::Time(0), Value::Float(1.0)],
            vec![Value::Time(SEC), Value::Null],
            vec![Value::Time(2 * SEC), Value::Float(3.0)],
        ]
    );

    let err = Chunk::from_rows(
        key,
        series_cols(ColType::Float),
        &[vec![Value::Time(0), Value::from("x")]],
        &b,
    )
    .expect_err("string into float");
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn rows_digest_ignores_chunk_boundaries() {
    let b = budget();
    let key = host_key("a");
    let whole = float_series(&key, &[Some(1.0), Some(2.0), None, Some(4.0)], &b);
    let split = vec![whole.slice(0, 1), whole.slice(1, 0), whole.slice(1, 3)];
    assert_eq!(rows_digest(&[whole.clone()]), rows_digest(&split));
    assert_ne!(whole.fingerprint(), split[0].fingerprint());

    let other = float_series(&host_key("b"), &[Some(1.0), Some(2.0), None, Some(4.0)], &b);
    assert_ne!(rows_digest(&[whole]), rows_digest(&[other]));
}

#[test]
fn retagging_keeps_buffers() {
    let b = budget();
    let chunk = float_series(&host_key("a"), &[Some(1.0)], &b);
    let before = chunk.values(1).clone();
    let moved = chunk.with_key(host_key("b"));
    assert_eq!(moved.key(), &host_key("b"));
    assert!(moved.values(1).shares_buffer(&before));
    assert_eq!(before.ref_count(), 2);
}

#[test]
fn chunk_builder_is_capped_by_the_budget() {
    let b = chunkflow_mem::MemoryBudgetImpl::new(256);
    let mut builder =
        ChunkBuilder::new(host_key("a"), series_cols(ColType::Float), &b).expect("builder");
    let err = builder.resize(1_000).expect_err("too large");
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    drop(builder);
    assert_eq!(b.used_bytes(), 0);
}

#[test]
fn empty_chunk_carries_schema_without_memory() {
    let b = budget();
    let chunk = Chunk::empty(host_key("a"), series_cols(ColType::Int));
    assert!(chunk.is_empty());
    assert_eq!(chunk.column_index(DEFAULT_VALUE_LABEL), Some(1));
    assert_eq!(chunk.values(1).ty(), ColType::Int);
    assert_eq!(chunk.values(1).accounted_bytes(), 0);
    assert_eq!(b.used_bytes(), 0);
}
