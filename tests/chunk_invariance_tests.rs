//! Output rows must not depend on how the input was split into chunks.

mod common;

use std::sync::Arc;

use chunkflow_core::hash::rows_digest;
use chunkflow_core::prelude::*;
use chunkflow_operators::plan::*;
use chunkflow_operators::*;

use common::*;

type Factory = Box<dyn Fn(Arc<dyn Allocator>) -> Built>;

fn ds() -> DatasetId {
    DatasetId::new(11)
}

fn factory(f: impl Fn(Arc<dyn Allocator>) -> Built + 'static) -> Factory {
    Box::new(f)
}

fn factories() -> Vec<(&'static str, Factory)> {
    vec![
        ("moving_average", factory(|a| new_moving_average_transformation(ds(), &PeriodSpec::new(3), a))),
        ("moving_average_short", factory(|a| new_moving_average_transformation(ds(), &PeriodSpec::new(50), a))),
        ("ema", factory(|a| new_exponential_moving_average_transformation(ds(), &PeriodSpec::new(3), a))),
        ("dema", factory(|a| new_double_exponential_moving_average_transformation(ds(), &PeriodSpec::new(2), a))),
        ("tema", factory(|a| new_triple_exponential_moving_average_transformation(ds(), &PeriodSpec::new(2), a))),
        ("trix", factory(|a| new_triple_exponential_derivative_transformation(ds(), &TripleExponentialDerivativeSpec { n: 2 }, a))),
        ("cmo", factory(|a| new_chande_momentum_oscillator_transformation(ds(), &PeriodSpec::new(3), a))),
        ("rsi", factory(|a| new_relative_strength_index_transformation(ds(), &PeriodSpec::new(3), a))),
        ("kama", factory(|a| new_kaufmans_ama_transformation(ds(), &KaufmansAmaSpec::new(3), a))),
        ("cumulative_sum", factory(|a| new_cumulative_sum_transformation(ds(), &CumulativeSumSpec::default(), a))),
        ("derivative", factory(|a| new_derivative_transformation(ds(), &DerivativeSpec::default(), a))),
        (
            "derivative_non_negative",
            factory(|a| {
                let spec = DerivativeSpec {
                    non_negative: true,
                    initial_zero: true,
                    ..DerivativeSpec::default()
                };
                new_derivative_transformation(ds(), &spec, a)
            }),
        ),
        ("difference", factory(|a| new_difference_transformation(ds(), &DifferenceSpec::default(), a))),
        ("integral", factory(|a| new_integral_transformation(ds(), &IntegralSpec::default(), a))),
        ("timeshift", factory(|a| new_timeshift_transformation(ds(), &TimeShiftSpec::new(-SEC), a))),
        ("sum", factory(|a| new_sum_transformation(ds(), &AggregateSpec::default(), a))),
        ("count", factory(|a| new_count_transformation(ds(), &AggregateSpec::default(), a))),
        ("stddev", factory(|a| new_stddev_transformation(ds(), &MomentSpec::default(), a))),
        ("skew", factory(|a| new_skew_transformation(ds(), &AggregateSpec::default(), a))),
        (
            "exact_mean",
            factory(|a| new_quantile_transformation(ds(), &QuantileSpec::new(0.3, QuantileMethod::ExactMean), a)),
        ),
        (
            "exact_selector",
            factory(|a| new_quantile_transformation(ds(), &QuantileSpec::new(0.7, QuantileMethod::ExactSelector), a)),
        ),
    ]
}

/// Two partitions with nulls, repeated values and a dip.
fn float_input(b: &chunkflow_mem::MemoryBudgetImpl) -> Vec<Chunk> {
    vec![
        float_series(
            &host_key("a"),
            &[Some(1.0), Some(4.0), None, Some(2.0), Some(8.0), Some(8.0), None, Some(5.0), Some(11.0)],
            b,
        ),
        float_series(&host_key("b"), &[Some(3.0), None, Some(-2.0), Some(6.0), Some(1.5)], b),
    ]
}

fn int_input(b: &chunkflow_mem::MemoryBudgetImpl) -> Vec<Chunk> {
    vec![
        int_series(&host_key("a"), &[Some(10), Some(7), None, Some(12), Some(30)], b),
        int_series(&host_key("b"), &[Some(-4), Some(0), Some(9)], b),
    ]
}

fn assert_invariant(input: Vec<Chunk>, b: &chunkflow_mem::MemoryBudgetImpl) {
    for (name, build) in factories() {
        let whole = apply(|a| build(a), input.clone(), b)
            .unwrap_or_else(|e| panic!("{name} whole: {e}"));
        let split = apply(|a| build(a), one_row_chunks(&input), b)
            .unwrap_or_else(|e| panic!("{name} split: {e}"));
        assert_eq!(rows_digest(&whole), rows_digest(&split), "{name}");
        assert_eq!(
            whole.iter().map(Chunk::len).sum::<usize>(),
            split.iter().map(Chunk::len).sum::<usize>(),
            "{name}"
        );
    }
}

#[test]
fn float_series_are_chunk_invariant() {
    let b = budget();
    assert_invariant(float_input(&b), &b);
}

#[test]
fn int_series_are_chunk_invariant() {
    let b = budget();
    assert_invariant(int_input(&b), &b);
}

#[test]
fn uneven_splits_match_too() {
    let b = budget();
    let input = float_input(&b);
    let uneven: Vec<Chunk> = input
        .iter()
        .flat_map(|c| vec![c.slice(0, 2), c.slice(2, 0), c.slice(2, c.len())])
        .collect();
    for (name, build) in factories() {
        let whole = apply(|a| build(a), input.clone(), &b).expect(name);
        let split = apply(|a| build(a), uneven.clone(), &b).expect(name);
        assert_eq!(rows_digest(&whole), rows_digest(&split), "{name}");
    }
}

#[test]
fn moving_average_ignores_null_placement_across_chunks() {
    let b = budget();
    let key = host_key("a");
    let with_nulls = float_series(&key, &[Some(2.0), None, Some(4.0), None], &b);
    let out = apply(
        |a| new_moving_average_transformation(ds(), &PeriodSpec::new(2), a),
        one_row_chunks(&[with_nulls]),
        &b,
    )
    .expect("run");
    assert_close(&column_f64(&out, "_value"), &[Some(2.0), Some(4.0), Some(4.0)]);
}
