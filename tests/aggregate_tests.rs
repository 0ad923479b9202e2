//! Aggregates: one row per partition, emitted when the partition ends.

mod common;

use chunkflow_core::prelude::*;
use chunkflow_operators::plan::*;
use chunkflow_operators::*;

use common::*;

fn ds() -> DatasetId {
    DatasetId::new(7)
}

#[test]
fn sum_and_count_per_partition() {
    let b = budget();
    let a = host_key("a");
    let z = host_key("z");
    let input = vec![
        int_series(&a, &[Some(1), None, Some(2)], &b),
        int_series(&a, &[Some(4)], &b),
        int_series(&z, &[None], &b),
    ];

    let out = apply(
        |al| new_sum_transformation(ds(), &AggregateSpec::default(), al),
        input.clone(),
        &b,
    )
    .expect("sum");
    assert_eq!(
        rows(&out),
        vec![
            vec![Value::from("a"), Value::Int(7)],
            vec![Value::from("z"), Value::Null],
        ]
    );
    assert_eq!(out[0].cols()[0].label, "host");
    assert_eq!(out[0].key(), &a);

    let out = apply(
        |al| new_count_transformation(ds(), &AggregateSpec::default(), al),
        input,
        &b,
    )
    .expect("count");
    assert_eq!(
        rows(&out),
        vec![
            vec![Value::from("a"), Value::Int(3)],
            vec![Value::from("z"), Value::Int(0)],
        ]
    );
}

#[test]
fn sum_rejects_strings() {
    let b = budget();
    let key = host_key("a");
    let input = Chunk::from_rows(
        key,
        vec![ColMeta::new("_value", ColType::String)],
        &[vec![Value::from("x")]],
        &b,
    )
    .expect("chunk");
    let err = apply(
        |al| new_sum_transformation(ds(), &AggregateSpec::default(), al),
        vec![input],
        &b,
    )
    .err()
    .expect("strings");
    assert_eq!(err.kind(), ErrorKind::Unimplemented);
}

#[test]
fn stddev_modes_and_skew() {
    let b = budget();
    let key = host_key("a");
    let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    let values: Vec<Option<f64>> = xs.iter().copied().map(Some).collect();

    let population = MomentSpec {
        mode: Mode::Population,
        ..MomentSpec::default()
    };
    let out = apply(
        |al| new_stddev_transformation(ds(), &population, al),
        vec![float_series(&key, &values, &b)],
        &b,
    )
    .expect("stddev");
    assert_close(&column_f64(&out, "_value"), &[Some(2.0)]);

    let out = apply(
        |al| new_stddev_transformation(ds(), &MomentSpec::default(), al),
        vec![float_series(&key, &values, &b)],
        &b,
    )
    .expect("stddev");
    assert_close(&column_f64(&out, "_value"), &[Some((32.0f64 / 7.0).sqrt())]);

    let out = apply(
        |al| new_skew_transformation(ds(), &AggregateSpec::default(), al),
        vec![float_series(&key, &[Some(1.0), Some(2.0), Some(3.0)], &b)],
        &b,
    )
    .expect("skew");
    assert_close(&column_f64(&out, "_value"), &[Some(0.0)]);
}

#[test]
fn stddev_of_single_value_is_nan() {
    let b = budget();
    let key = host_key("a");
    let out = apply(
        |al| new_stddev_transformation(ds(), &MomentSpec::default(), al),
        vec![float_series(&key, &[Some(3.0)], &b)],
        &b,
    )
    .expect("stddev");
    assert_close(&column_f64(&out, "_value"), &[Some(f64::NAN)]);

    let population = MomentSpec {
        mode: Mode::Population,
        ..MomentSpec::default()
    };
    let out = apply(
        |al| new_stddev_transformation(ds(), &population, al),
        vec![float_series(&key, &[Some(3.0), None], &b)],
        &b,
    )
    .expect("stddev");
    assert_close(&column_f64(&out, "_value"), &[Some(f64::NAN)]);
}

#[test]
fn exact_mean_quantile_interpolates() {
    let b = budget();
    let key = host_key("a");
    let values = [Some(2.0), Some(2.0), Some(3.0)];
    let run = |q: f64| {
        let spec = QuantileSpec::new(q, QuantileMethod::ExactMean);
        let out = apply(
            |al| new_quantile_transformation(ds(), &spec, al),
            vec![float_series(&key, &values, &b)],
            &b,
        )
        .expect("quantile");
        column_f64(&out, "_value")
    };
    assert_close(&run(0.5), &[Some(2.0)]);
    assert_close(&run(0.0), &[Some(2.0)]);
    assert_close(&run(1.0), &[Some(3.0)]);
    assert_close(&run(0.75), &[Some(2.5)]);
}

#[test]
fn exact_selector_returns_whole_row() {
    let b = budget();
    let key = host_key("a");
    let input = float_series(&key, &[Some(9.0), Some(2.0), Some(3.0), None], &b);
    let spec = QuantileSpec::new(0.5, QuantileMethod::ExactSelector);
    let out = apply(
        |al| new_quantile_transformation(ds(), &spec, al),
        vec![input],
        &b,
    )
    .expect("selector");
    assert_eq!(rows(&out), vec![vec![Value::Time(2 * SEC), Value::Float(3.0)]]);

    let spec = QuantileSpec::new(0.0, QuantileMethod::ExactSelector);
    let out = apply(
        |al| new_quantile_transformation(ds(), &spec, al),
        vec![float_series(&key, &[Some(9.0), Some(2.0)], &b)],
        &b,
    )
    .expect("selector");
    assert_eq!(rows(&out), vec![vec![Value::Time(SEC), Value::Float(2.0)]]);
}

#[test]
fn exact_selector_on_empty_partition_emits_nothing() {
    let b = budget();
    let key = host_key("a");
    let spec = QuantileSpec::new(0.5, QuantileMethod::ExactSelector);
    let out = apply(
        |al| new_quantile_transformation(ds(), &spec, al),
        vec![float_series(&key, &[None, None], &b)],
        &b,
    )
    .expect("selector");
    assert!(out.is_empty());
}

#[test]
fn tdigest_estimate_is_close_on_uniform_data() {
    let b = budget();
    let key = host_key("a");
    let values: Vec<Option<f64>> = (1..=1000).map(|v| Some(v as f64)).collect();
    let spec = QuantileSpec::new(0.5, QuantileMethod::EstimateTdigest);
    let out = apply(
        |al| new_quantile_transformation(ds(), &spec, al),
        vec![float_series(&key, &values, &b)],
        &b,
    )
    .expect("estimate");
    let got = column_f64(&out, "_value")[0].expect("value");
    assert!((got - 500.0).abs() < 10.0, "got {got}");
}

#[test]
fn quantile_spec_validation() {
    let b = budget();
    let bad_q = QuantileSpec::new(1.5, QuantileMethod::ExactMean);
    let err = new_quantile_transformation(ds(), &bad_q, std::sync::Arc::new(b.clone()))
        .err()
        .expect("q out of range");
    assert_eq!(err.kind(), ErrorKind::Invalid);

    let mut compressed = QuantileSpec::new(0.5, QuantileMethod::ExactSelector);
    compressed.compression = Some(100.0);
    let err = new_quantile_transformation(ds(), &compressed, std::sync::Arc::new(b))
        .err()
        .expect("compression with selector");
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn selector_requires_its_column() {
    let b = budget();
    let key = host_key("a");
    let mut spec = QuantileSpec::new(0.5, QuantileMethod::ExactSelector);
    spec.column = "missing".into();
    let err = apply(
        |al| new_quantile_transformation(ds(), &spec, al),
        vec![float_series(&key, &[Some(1.0)], &b)],
        &b,
    )
    .err()
    .expect("missing");
    assert_eq!(
        err,
        Error::FailedPrecondition("no column \"missing\" exists".into())
    );
}
