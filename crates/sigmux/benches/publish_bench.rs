//! Benchmarks for the dispatch hot path.
//!
//! Run with: `cargo bench --package sigmux --bench publish_bench`
//!
//! Publish cost is dominated by the snapshot clone (one `Rc` bump per
//! entry) plus the callback calls themselves; subscribe cost by the sorted
//! insert and the monitor map update. The filter benchmark measures the
//! per-entry predicate overhead against the unfiltered baseline.

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sigmux::{OwnerId, Signal, SignalHub};

struct Tick {
    frame: u64,
}
impl Signal for Tick {}

fn hub_with_subscribers(count: u64) -> (SignalHub, Rc<Cell<u64>>) {
    let hub = SignalHub::new();
    let sink = Rc::new(Cell::new(0u64));
    for owner in 0..count {
        let sink = Rc::clone(&sink);
        // Spread priorities so the sorted insert path is exercised.
        let priority = (owner % 7) as i32;
        hub.subscribe_fn(OwnerId::new(owner), priority, move |tick: &Tick| {
            sink.set(sink.get().wrapping_add(tick.frame));
        });
    }
    (hub, sink)
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    for count in [1u64, 10, 100, 1000] {
        let (hub, sink) = hub_with_subscribers(count);
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| hub.publish(black_box(&Tick { frame: 1 })));
        });
        black_box(sink.get());
    }
    group.finish();
}

fn bench_publish_filtered(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_filtered");
    for count in [10u64, 100, 1000] {
        let (hub, _sink) = hub_with_subscribers(count);
        let half = |owner: OwnerId| owner.raw() % 2 == 0;
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| hub.publish_filtered(black_box(&Tick { frame: 1 }), &[&half]));
        });
    }
    group.finish();
}

fn bench_subscribe_churn(c: &mut Criterion) {
    c.bench_function("subscribe_unsubscribe_churn", |b| {
        let hub = SignalHub::new();
        let owner = OwnerId::new(1);
        b.iter(|| {
            let handler = hub.subscribe_fn(owner, 0, |_: &Tick| {});
            hub.unsubscribe(owner, &handler);
        });
    });
}

criterion_group!(
    benches,
    bench_publish,
    bench_publish_filtered,
    bench_subscribe_churn
);
criterion_main!(benches);
