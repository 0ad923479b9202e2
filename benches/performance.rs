use criterion::{criterion_group, criterion_main, Criterion};
use chunkflow_core::prelude::*;
use chunkflow_exec::{Engine, Partition, Procedure};
use chunkflow_operators::plan::{DerivativeSpec, PeriodSpec};

fn make_partitions(engine: &Engine, rows: usize) -> Vec<Partition> {
    let cols = vec![
        ColMeta::new(DEFAULT_TIME_LABEL, ColType::Time),
        ColMeta::new(DEFAULT_VALUE_LABEL, ColType::Float),
    ];
    (0..4)
        .map(|g| {
            let key = GroupKey::new(
                vec![ColMeta::new("group", ColType::String)],
                vec![Value::from(format!("group-{g}"))],
            )
            .unwrap();
            let data: Vec<Vec<Value>> = (0..rows)
                .map(|i| vec![Value::Time(i as i64 * 1_000), Value::Float((i % 10) as f64)])
                .collect();
            let chunk = Chunk::from_rows(key.clone(), cols.clone(), &data, engine.budget()).unwrap();
            (key, vec![chunk])
        })
        .collect()
}

fn bench_windows(c: &mut Criterion) {
    let mut engine = Engine::new(EngineConfig {
        mem_cap_bytes: 64 * 1024 * 1024,
        ..EngineConfig::default()
    })
    .unwrap();
    let input = make_partitions(&engine, 4096);

    let ma = Procedure::MovingAverage(PeriodSpec::new(10));
    c.bench_function("moving_average", |b| {
        b.iter(|| {
            let _ = engine.run(&ma, input.clone()).unwrap();
        })
    });

    let derivative = Procedure::Derivative(DerivativeSpec::default());
    c.bench_function("derivative", |b| {
        b.iter(|| {
            let _ = engine.run(&derivative, input.clone()).unwrap();
        })
    });
}

criterion_group!(windows, bench_windows);
criterion_main!(windows);
