use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{guarded, EngineError, EvalError};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::types::{RuleCore, RuleParts};
use crate::{Action, Fact, Rule, RuleBuilder};

const MIN_TRIGGER_DELAY: Duration = Duration::from_millis(1000);

/// Trigger state key used by [`TriggerScope::WholeRule`].
const WHOLE_RULE_KEY: &str = "";

/// What a stateful rule remembers as "already triggered".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerScope {
    /// One trigger state per fact id. Unrelated fact ids trigger and reset
    /// independently.
    #[default]
    PerFact,
    /// A single rule-wide trigger state, reset by any non-matching fact.
    WholeRule,
}

/// Builder for a [`StatefulTriggerRule`]. Obtained from
/// [`RuleBuilder::stateful`].
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use firerule::{field, RuleBuilder, Scheduler};
///
/// let timers = Arc::new(Scheduler::new("timers", 1).unwrap());
/// let alarm = RuleBuilder::new("alarm")
///     .when(field("temp").gt(90_i64))
///     .stateful()
///     .trigger_delay(Duration::from_secs(5))
///     .build(&timers)
///     .unwrap();
/// assert_eq!(alarm.trigger_delay(), Some(Duration::from_secs(5)));
/// ```
pub struct StatefulRuleBuilder {
    rule: RuleBuilder,
    delay: Option<Duration>,
    scope: TriggerScope,
}

impl StatefulRuleBuilder {
    #[must_use]
    pub fn new(rule: RuleBuilder) -> Self {
        Self {
            rule,
            delay: None,
            scope: TriggerScope::default(),
        }
    }

    /// Postpone the `then` action by `delay`. Must be at least one second.
    #[must_use]
    pub fn trigger_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: TriggerScope) -> Self {
        self.scope = scope;
        self
    }

    /// Build the rule. Delayed activations run on `scheduler`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTriggerDelay`] for a delay under one
    /// second, or [`EngineError::MissingCondition`] if no condition was set.
    pub fn build(self, scheduler: &Arc<Scheduler>) -> Result<StatefulTriggerRule, EngineError> {
        if let Some(delay) = self.delay {
            if delay < MIN_TRIGGER_DELAY {
                return Err(EngineError::InvalidTriggerDelay {
                    delay_ms: delay.as_millis(),
                });
            }
        }
        let RuleParts {
            core,
            then,
            otherwise,
        } = self.rule.into_parts()?;
        Ok(StatefulTriggerRule {
            shared: Arc::new(TriggerShared {
                rule: core.name.clone(),
                then,
                otherwise,
                state: Mutex::new(TriggerState::default()),
            }),
            core,
            delay: self.delay,
            scope: self.scope,
            scheduler: Arc::clone(scheduler),
        })
    }
}

struct Pending {
    task: ScheduledTask,
    generation: u64,
}

#[derive(Default)]
struct TriggerState {
    triggered: HashSet<String>,
    pending: HashMap<String, Pending>,
    next_generation: u64,
}

/// State shared between the rule and its in-flight timer callbacks.
struct TriggerShared {
    rule: String,
    then: Box<dyn Action>,
    otherwise: Box<dyn Action>,
    state: Mutex<TriggerState>,
}

impl TriggerShared {
    /// Timer callback for the activation scheduled as `generation`.
    fn activate(&self, key: &str, generation: u64, fact: &Fact) {
        let mut state = self.state.lock();
        match state.pending.get(key) {
            Some(pending) if pending.generation == generation => {
                state.pending.remove(key);
            }
            _ => {
                debug!(rule = %self.rule, fact = %fact.id(), "superseded activation ignored");
                return;
            }
        }
        if state.triggered.contains(key) {
            return;
        }
        match guarded(|| self.then.execute(fact)) {
            Ok(()) => {
                state.triggered.insert(key.to_owned());
                debug!(rule = %self.rule, fact = %fact.id(), "delayed trigger fired");
            }
            Err(e) => {
                error!(rule = %self.rule, fact = %fact.id(), error = %e, "delayed action failed");
            }
        }
    }
}

/// A rule that runs `then` once per trigger and `else` once per reset.
///
/// Repeated matches for a triggered key are ignored; the first non-match
/// resets it. With a trigger delay, a match schedules the activation instead
/// of running it, and a non-match before the delay elapses cancels it.
pub struct StatefulTriggerRule {
    core: RuleCore,
    shared: Arc<TriggerShared>,
    delay: Option<Duration>,
    scope: TriggerScope,
    scheduler: Arc<Scheduler>,
}

impl StatefulTriggerRule {
    #[must_use]
    pub fn trigger_delay(&self) -> Option<Duration> {
        self.delay
    }

    #[must_use]
    pub fn scope(&self) -> TriggerScope {
        self.scope
    }

    /// Whether `then` has run for this fact id and not been reset since.
    /// Under [`TriggerScope::WholeRule`] the id is ignored.
    #[must_use]
    pub fn is_triggered(&self, fact_id: &str) -> bool {
        self.shared.state.lock().triggered.contains(self.key(fact_id))
    }

    /// Activations scheduled but not yet run or cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    fn key<'a>(&self, fact_id: &'a str) -> &'a str {
        match self.scope {
            TriggerScope::PerFact => fact_id,
            TriggerScope::WholeRule => WHOLE_RULE_KEY,
        }
    }

    /// Arm a delayed activation for `key`. Nothing is recorded as pending if
    /// the timer pool has already been shut down.
    fn schedule(
        &self,
        state: &mut TriggerState,
        key: &str,
        delay: Duration,
        fact: &Arc<Fact>,
    ) -> Result<(), EvalError> {
        let generation = state.next_generation;
        state.next_generation += 1;
        let shared = Arc::clone(&self.shared);
        let fact = Arc::clone(fact);
        let timer_key = key.to_owned();
        let task = self
            .scheduler
            .schedule(delay, move || {
                shared.activate(&timer_key, generation, &fact);
            })
            .ok_or_else(|| EvalError::failed("trigger scheduler is shut down"))?;
        state
            .pending
            .insert(key.to_owned(), Pending { task, generation });
        Ok(())
    }
}

impl Rule for StatefulTriggerRule {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn name(&self) -> &str {
        &self.core.name
    }

    fn description(&self) -> &str {
        &self.core.description
    }

    fn priority(&self) -> i32 {
        self.core.priority
    }

    fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    fn enable(&self) {
        self.core.set_enabled(true);
    }

    fn disable(&self) {
        self.core.set_enabled(false);
    }

    fn pre_evaluate(&self, fact: &Fact) -> bool {
        self.core.pre_evaluate(fact)
    }

    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        self.core.evaluate(fact)
    }

    fn execute_then(&self, fact: &Arc<Fact>) -> Result<(), EvalError> {
        let key = self.key(fact.id());
        let mut state = self.shared.state.lock();
        if state.triggered.contains(key) {
            debug!(rule = %self.core.name, fact = %fact.id(), "already triggered");
            return Ok(());
        }
        match self.delay {
            Some(delay) => {
                if state.pending.contains_key(key) {
                    debug!(rule = %self.core.name, fact = %fact.id(), "activation already pending");
                } else {
                    self.schedule(&mut state, key, delay, fact)?;
                    debug!(
                        rule = %self.core.name,
                        fact = %fact.id(),
                        delay_ms = delay.as_millis() as u64,
                        "activation scheduled"
                    );
                }
                Ok(())
            }
            None => {
                self.shared.then.execute(fact)?;
                state.triggered.insert(key.to_owned());
                debug!(rule = %self.core.name, fact = %fact.id(), "triggered");
                Ok(())
            }
        }
    }

    fn execute_else(&self, fact: &Arc<Fact>) -> Result<(), EvalError> {
        let key = self.key(fact.id());
        let mut state = self.shared.state.lock();
        if let Some(pending) = state.pending.remove(key) {
            pending.task.cancel();
            debug!(rule = %self.core.name, fact = %fact.id(), "pending activation cancelled");
        }
        if state.triggered.remove(key) {
            debug!(rule = %self.core.name, fact = %fact.id(), "trigger reset");
            self.shared.otherwise.execute(fact)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StatefulTriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulTriggerRule")
            .field("core", &self.core)
            .field("delay", &self.delay)
            .field("scope", &self.scope)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
