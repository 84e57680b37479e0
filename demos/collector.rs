use std::sync::Arc;
use std::thread;
use std::time::Duration;

use firerule::{effect, field, EngineConfig, Fact, QueueCollector, RuleBuilder, RuleEngine, RuleRegistry};

fn main() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .add(
            RuleBuilder::new("low_pressure")
                .when(field("pressure").lt(1.5_f64))
                .then(effect(|fact| println!("{}: pressure low", fact.id())))
                .build()
                .expect("failed to build rule"),
        )
        .expect("failed to register rule");

    let engine = RuleEngine::new(registry, EngineConfig::default()).expect("invalid engine config");
    engine.start().expect("failed to start engine");

    let sensors = Arc::new(QueueCollector::new("pressure-sensors", 256).expect("bad capacity"));
    engine
        .fire_by_collector(Duration::from_millis(100), sensors.clone(), false)
        .expect("failed to register collector");

    // Sensor threads push readings; the engine drains them every 100ms.
    let producers: Vec<_> = (0..3)
        .map(|n| {
            let sensors = Arc::clone(&sensors);
            thread::spawn(move || {
                for tick in 0..5 {
                    let pressure = 1.0 + f64::from((n + tick) % 4) * 0.25;
                    let reading = Fact::new(format!("pipe-{n}")).set("pressure", pressure);
                    if !sensors.offer(reading) {
                        eprintln!("pipe-{n}: collector full, reading dropped");
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("sensor thread panicked");
    }

    thread::sleep(Duration::from_millis(300));
    engine.remove_fact_collector("pressure-sensors");
    engine.shutdown();
    println!("{:?}", engine.stats());
}
