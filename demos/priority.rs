use std::sync::Arc;

use firerule::{effect, field, EngineConfig, Fact, RuleBuilder, RuleEngine, RuleRegistry};

fn main() {
    let registry = Arc::new(RuleRegistry::new());

    let rules = [
        // Higher priority is evaluated first. A rule without a priority
        // gets DEFAULT_PRIORITY and would run before every rule here.
        RuleBuilder::new("deny_banned")
            .priority(100)
            .when(field("user.banned").is_true())
            .then(effect(|_| println!("  deny_banned: DENY"))),
        RuleBuilder::new("allow_adult")
            .priority(10)
            .when(field("user.age").gte(18_i64))
            .then(effect(|_| println!("  allow_adult: ALLOW")))
            .otherwise(effect(|_| println!("  allow_adult: not an adult"))),
        RuleBuilder::new("audit")
            .priority(0)
            .when(field("user.age").gte(0_i64))
            .then(effect(|fact| println!("  audit: saw {}", fact.id()))),
    ];
    for rule in rules {
        registry
            .add(rule.build().expect("failed to build rule"))
            .expect("failed to register rule");
    }
    println!("walk order: {:?}", registry.ids());

    // Stop each fact's walk at the first rule that applies, so a banned
    // user is never allowed and the audit only sees users no earlier rule
    // applied to.
    let config = EngineConfig::builder()
        .worker_count(1)
        .skip_on_first_applied_rule(true)
        .build()
        .expect("invalid engine config");
    let engine = RuleEngine::new(registry, config).expect("invalid engine config");
    engine.start().expect("failed to start engine");

    let users = [
        Fact::new("alice").set("user.age", 30_i64).set("user.banned", false),
        Fact::new("bob").set("user.age", 25_i64).set("user.banned", true),
        Fact::new("carol").set("user.age", 15_i64).set("user.banned", false),
    ];
    for user in users {
        engine.fire(user, true).expect("engine stopped");
    }
    engine.shutdown();
}
