use std::sync::Arc;
use std::thread;
use std::time::Duration;

use firerule::{effect, field, EngineConfig, Fact, RuleBuilder, RuleEngine, RuleRegistry};

fn main() {
    let registry = Arc::new(RuleRegistry::new());
    let engine = RuleEngine::new(Arc::clone(&registry), EngineConfig::default())
        .expect("invalid engine config");

    // Alarm only if the door stays open for two seconds; closing it clears
    // the alarm (or cancels it if it has not fired yet).
    let door_alarm = RuleBuilder::new("door_open_too_long")
        .when(field("open").is_true())
        .then(effect(|fact| println!("ALARM: {} left open", fact.id())))
        .otherwise(effect(|fact| println!("cleared: {} closed", fact.id())))
        .stateful()
        .trigger_delay(Duration::from_secs(2))
        .build(engine.delay_scheduler())
        .expect("failed to build rule");
    let door_alarm = Arc::new(door_alarm);
    registry
        .add_shared(door_alarm.clone())
        .expect("failed to register rule");

    engine.start().expect("failed to start engine");

    let door = |id: &str, open: bool| Fact::new(id).set("open", open);

    // Front door: opened briefly, closed before the delay.
    engine.fire(door("front", true), false).expect("engine stopped");
    // Back door: left open.
    engine.fire(door("back", true), false).expect("engine stopped");
    thread::sleep(Duration::from_millis(500));
    engine.fire(door("front", false), false).expect("engine stopped");

    thread::sleep(Duration::from_millis(2000));
    println!(
        "front triggered: {}, back triggered: {}",
        door_alarm.is_triggered("front"),
        door_alarm.is_triggered("back")
    );

    engine.fire(door("back", false), false).expect("engine stopped");
    engine.shutdown();
}
