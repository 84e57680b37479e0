
use std::collections::HashMap;
use std::sync::Arc;

use firerule::{effect, EngineConfig, EngineError, Rule, RuleEngine, RuleRegistry};
use parking_lot::Mutex;
use proptest::prelude::*;
use strategies::{arb_fact, arb_rules, GenRule};

/// Register `rules` in order, returning the ones that were accepted.
fn populate(registry: &RuleRegistry, rules: &[GenRule]) -> Vec<GenRule> {
    let mut accepted = Vec::new();
    for rule in rules {
        match registry.add(rule.builder().build().unwrap()) {
            Ok(()) => accepted.push(rule.clone()),
            Err(e) => assert_eq!(
                e,
                EngineError::DuplicateRule {
                    id: rule.id.clone()
                }
            ),
        }
    }
    accepted
}

/// Stable sort by descending priority: the walk order the registry promises.
fn expected_order(accepted: &[GenRule]) -> Vec<String> {
    let mut sorted = accepted.to_vec();
    sorted.sort_by_key(|r| std::cmp::Reverse(r.effective_priority()));
    sorted.into_iter().map(|r| r.id).collect()
}

// ---------------------------------------------------------------------------
// Invariant 1: Ordering
//
// Walk order is descending priority, ties in insertion order.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn walk_order_is_descending_priority(rules in arb_rules()) {
        let registry = RuleRegistry::new();
        let accepted = populate(&registry, &rules);
        prop_assert_eq!(registry.ids(), expected_order(&accepted));

        let snapshot: Vec<String> = registry.snapshot().iter().map(|r| r.id().to_owned()).collect();
        prop_assert_eq!(snapshot, registry.ids());
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: Uniqueness
//
// A duplicate add never replaces the first registration.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn first_registration_wins(rules in arb_rules()) {
        let registry = RuleRegistry::new();
        populate(&registry, &rules);

        let mut first: HashMap<&str, i32> = HashMap::new();
        for rule in &rules {
            first.entry(rule.id.as_str()).or_insert(rule.effective_priority());
        }
        prop_assert_eq!(registry.len(), first.len());
        for (id, priority) in first {
            prop_assert_eq!(registry.get(id).map(|r| r.priority()), Some(priority));
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: Index consistency
//
// After arbitrary removals the id index and the ordered walk agree.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn removals_keep_indexes_consistent(
        rules in arb_rules(),
        removals in prop::collection::vec(0_u8..12, 0..12),
    ) {
        let registry = RuleRegistry::new();
        let mut accepted = populate(&registry, &rules);
        for n in removals {
            let id = format!("rule-{n}");
            let was_present = accepted.iter().any(|r| r.id == id);
            prop_assert_eq!(registry.remove(&id).is_some(), was_present);
            accepted.retain(|r| r.id != id);
            prop_assert!(registry.get(&id).is_none());
        }
        prop_assert_eq!(registry.len(), accepted.len());
        prop_assert_eq!(registry.ids(), expected_order(&accepted));
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: Ordered firing follows the registry
//
// With no skip flags, an ordered fire runs one action per rule in walk order.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn ordered_fire_follows_walk_order(rules in arb_rules(), fact in arb_fact()) {
        let log: Arc<Mutex<Vec<String>>> = Arc::default();
        let registry = Arc::new(RuleRegistry::new());
        let mut accepted = Vec::new();
        for rule in &rules {
            let then_log = Arc::clone(&log);
            let else_log = Arc::clone(&log);
            let then_id = rule.id.clone();
            let else_id = rule.id.clone();
            let built = rule
                .builder()
                .then(effect(move |_| then_log.lock().push(then_id.clone())))
                .otherwise(effect(move |_| else_log.lock().push(else_id.clone())))
                .build()
                .unwrap();
            if registry.add(built).is_ok() {
                accepted.push(rule.clone());
            }
        }

        let config = EngineConfig::builder().worker_count(1).collector_pool_size(1).build().unwrap();
        let engine = RuleEngine::new(Arc::clone(&registry), config).unwrap();
        engine.start().unwrap();
        engine.fire(fact, true).unwrap();
        engine.shutdown();

        prop_assert_eq!(log.lock().clone(), expected_order(&accepted));
    }
}
