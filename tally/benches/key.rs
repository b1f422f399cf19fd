use criterion::{criterion_group, criterion_main, Criterion};

use std::sync::Arc;

use tally::{AccumulatingFloatCounter, CounterHandle, FloatCounterFn, Key, Label};

fn key_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("key");
    group.bench_function("from_name/static", |b| b.iter(|| Key::from_name("simple_name")));
    group.bench_function("from_name/owned", |b| {
        b.iter(|| Key::from_name("simple_name".to_string()))
    });
    group.bench_function("from_parts", |b| {
        b.iter(|| {
            Key::from_parts(
                "simple_name",
                vec![Label::new("type", "http"), Label::new("route", "/")],
            )
        })
    });
    group.finish();
}

fn adapter_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("adapter");
    group.bench_function("float_counter/integral", |b| {
        let adapter =
            AccumulatingFloatCounter::new(CounterHandle::from_arc(Arc::new(Sink::default())));
        b.iter(|| adapter.increment(2.0));
    });
    group.bench_function("float_counter/fractional", |b| {
        let adapter =
            AccumulatingFloatCounter::new(CounterHandle::from_arc(Arc::new(Sink::default())));
        b.iter(|| adapter.increment(0.333));
    });
    group.finish();
}

#[derive(Default)]
struct Sink;

impl tally::CounterFn for Sink {
    fn increment(&self, _value: i64) {}
    fn reset(&self) {}
}

criterion_group!(benches, key_benchmark, adapter_benchmark);
criterion_main!(benches);
