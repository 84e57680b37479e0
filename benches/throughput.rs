use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use firerule::{field, EngineConfig, Fact, RuleBuilder, RuleEngine, RuleRegistry};

fn build_registry() -> Arc<RuleRegistry> {
    let registry = Arc::new(RuleRegistry::new());
    for i in 0..20 {
        let rule = RuleBuilder::new(format!("r{i}"))
            .priority(i)
            .when(field(&format!("f{i}")).gte(1_i64))
            .build()
            .unwrap();
        registry.add(rule).unwrap();
    }
    registry
}

fn sample_fact() -> Fact {
    (0..20).fold(Fact::new("bench"), |fact, i| {
        fact.set(&format!("f{i}"), 10_i64)
    })
}

/// Fire `iters` facts from `producers` threads and wait for the queue to
/// drain. Returns the wall time including the drain.
fn run(registry: &Arc<RuleRegistry>, producers: u64, iters: u64, ordered: bool) -> Duration {
    let engine = Arc::new(RuleEngine::new(Arc::clone(registry), EngineConfig::default()).unwrap());
    engine.start().unwrap();
    let per_producer = iters / producers;
    let fact = sample_fact();

    let start = Instant::now();
    let handles: Vec<_> = (0..producers)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let fact = fact.clone();
            thread::spawn(move || {
                for _ in 0..per_producer {
                    engine.fire(fact.clone(), ordered).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    engine.shutdown();
    start.elapsed()
}

fn bench_throughput(c: &mut Criterion) {
    let registry = build_registry();
    let producer_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &producers in &producer_counts {
        group.bench_function(format!("unordered_{producers}_producers"), |b| {
            b.iter_custom(|iters| run(&registry, producers, iters.max(producers), false));
        });
        group.bench_function(format!("ordered_{producers}_producers"), |b| {
            b.iter_custom(|iters| run(&registry, producers, iters.max(producers), true));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
