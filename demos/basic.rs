use std::sync::Arc;

use firerule::{effect, EngineConfig, Expr, Fact, RuleBuilder, RuleEngine, RuleRegistry};

fn main() {
    let registry = Arc::new(RuleRegistry::new());

    // Conditions can be written as text...
    let overheat = Expr::parse("temp > 90 AND NOT maintenance").expect("failed to parse condition");
    registry
        .add(
            RuleBuilder::new("overheat")
                .description("boiler running too hot")
                .when(overheat)
                .then(effect(|fact| println!("{}: overheating", fact.id())))
                .otherwise(effect(|fact| println!("{}: temperature ok", fact.id())))
                .build()
                .expect("failed to build rule"),
        )
        .expect("failed to register rule");

    let engine = RuleEngine::new(Arc::clone(&registry), EngineConfig::default())
        .expect("invalid engine config");
    engine.start().expect("failed to start engine");

    println!("{registry}");

    for (id, temp) in [("boiler-1", 95_i64), ("boiler-2", 60), ("boiler-3", 120)] {
        let fact = Fact::new(id)
            .set("temp", temp)
            .set("maintenance", id == "boiler-3");
        engine.fire(fact, false).expect("engine stopped");
    }

    engine.shutdown();
    println!("{:?}", engine.stats());
}
