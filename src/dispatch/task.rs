use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::evaluate::{priority_walk, run_single, Outcome};
use crate::{Fact, Rule, RuleRegistry, SkipPolicy};

/// One unit of dispatch work.
pub(crate) enum Task {
    /// Unordered firing: one rule against one fact.
    Single { fact: Arc<Fact>, rule: Arc<dyn Rule> },
    /// Ordered firing: a whole priority walk for one fact.
    Ordered {
        fact: Arc<Fact>,
        registry: Arc<RuleRegistry>,
        policy: SkipPolicy,
    },
}

impl Task {
    /// Run the task to completion. Returns `false` if any rule failed.
    pub(crate) fn run(self) -> bool {
        match self {
            Task::Single { fact, rule } => match run_single(rule.as_ref(), &fact) {
                Ok(outcome) => {
                    match outcome {
                        Outcome::Applied => debug!(rule = %rule.id(), fact = %fact.id(), "hit"),
                        Outcome::NotApplied => debug!(rule = %rule.id(), fact = %fact.id(), "miss"),
                        Outcome::Skipped => debug!(rule = %rule.id(), fact = %fact.id(), "skipped"),
                    }
                    true
                }
                Err(e) => {
                    error!(rule = %rule.id(), fact = %fact.id(), error = %e, "rule failed");
                    false
                }
            },
            Task::Ordered {
                fact,
                registry,
                policy,
            } => priority_walk(&registry, &fact, policy).failed.is_empty(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Single { fact, rule } => f
                .debug_struct("Single")
                .field("fact", &fact.id())
                .field("rule", &rule.id())
                .finish(),
            Task::Ordered { fact, policy, .. } => f
                .debug_struct("Ordered")
                .field("fact", &fact.id())
                .field("policy", policy)
                .finish_non_exhaustive(),
        }
    }
}
