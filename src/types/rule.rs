use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::action::{Action, NoopAction};
use super::condition::Condition;
use super::Fact;
use crate::error::{EngineError, EvalError};

/// Name given to rules built without one.
pub const DEFAULT_NAME: &str = "rule";

/// Priority of rules built without one.
///
/// Larger priorities run earlier in ordered mode, so an unprioritized rule
/// runs *before* every rule given an ordinary small priority.
pub const DEFAULT_PRIORITY: i32 = i32::MAX - 1;

/// A prioritized, enable-able condition/action pair.
///
/// Two rules are the same rule iff their ids are equal; the
/// [`RuleRegistry`](crate::RuleRegistry) keys on the id.
pub trait Rule: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        DEFAULT_NAME
    }

    fn description(&self) -> &str {
        ""
    }

    /// Larger values are evaluated earlier in ordered mode.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn is_enabled(&self) -> bool;

    fn enable(&self);

    fn disable(&self);

    /// Cheap filter run before [`evaluate`](Self::evaluate). A `false` here
    /// skips the rule without running either action.
    fn pre_evaluate(&self, _fact: &Fact) -> bool {
        true
    }

    /// Decide whether the fact matches. A disabled rule never matches.
    ///
    /// # Errors
    ///
    /// Propagates the condition's [`EvalError`].
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError>;

    /// Run when [`evaluate`](Self::evaluate) returned `true`.
    ///
    /// # Errors
    ///
    /// Propagates the action's [`EvalError`].
    fn execute_then(&self, fact: &Arc<Fact>) -> Result<(), EvalError>;

    /// Run when [`evaluate`](Self::evaluate) returned `false`.
    ///
    /// # Errors
    ///
    /// Propagates the action's [`EvalError`].
    fn execute_else(&self, _fact: &Arc<Fact>) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Identity, ordering, filter and condition shared by every built-in rule kind.
pub(crate) struct RuleCore {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) priority: i32,
    enabled: AtomicBool,
    concerned_facts: Option<HashSet<String>>,
    condition: Box<dyn Condition>,
}

impl RuleCore {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn pre_evaluate(&self, fact: &Fact) -> bool {
        self.concerned_facts
            .as_ref()
            .map_or(true, |ids| ids.contains(fact.id()))
    }

    pub(crate) fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        if !self.is_enabled() {
            warn!(rule = %self.name, fact = %fact.id(), "evaluating a disabled rule");
            return Ok(false);
        }
        self.condition.evaluate(fact)
    }
}

impl fmt::Debug for RuleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.is_enabled())
            .field("concerned_facts", &self.concerned_facts)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`BasicRule`], or, via
/// [`stateful()`](Self::stateful), a
/// [`StatefulTriggerRule`](crate::StatefulTriggerRule).
///
/// # Example
///
/// ```
/// use firerule::{effect, field, Rule, RuleBuilder};
///
/// let rule = RuleBuilder::new("overheat")
///     .priority(10)
///     .when(field("temp").gt(90_i64))
///     .then(effect(|fact| println!("overheating: {}", fact.id())))
///     .build()
///     .unwrap();
/// assert_eq!(rule.priority(), 10);
/// ```
pub struct RuleBuilder {
    id: String,
    name: Option<String>,
    description: String,
    priority: Option<i32>,
    concerned_facts: Option<HashSet<String>>,
    enabled: bool,
    condition: Option<Box<dyn Condition>>,
    then: Option<Box<dyn Action>>,
    otherwise: Option<Box<dyn Action>>,
}

pub(crate) struct RuleParts {
    pub(crate) core: RuleCore,
    pub(crate) then: Box<dyn Action>,
    pub(crate) otherwise: Box<dyn Action>,
}

impl RuleBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: String::new(),
            priority: None,
            concerned_facts: None,
            enabled: true,
            condition: None,
            then: None,
            otherwise: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Defaults to [`DEFAULT_PRIORITY`] when never called.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restrict the rule to facts with this id. May be called repeatedly;
    /// a rule with no concerned ids considers every fact.
    #[must_use]
    pub fn concerned_fact(mut self, fact_id: impl Into<String>) -> Self {
        self.concerned_facts
            .get_or_insert_with(HashSet::new)
            .insert(fact_id.into());
        self
    }

    /// Start disabled. Rules are enabled by default.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn when(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    #[must_use]
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.then = Some(Box::new(action));
        self
    }

    /// The recovery action, run when the condition does not hold.
    #[must_use]
    pub fn otherwise(mut self, action: impl Action + 'static) -> Self {
        self.otherwise = Some(Box::new(action));
        self
    }

    /// Continue building a delayed, deduplicating stateful rule.
    #[must_use]
    pub fn stateful(self) -> crate::StatefulRuleBuilder {
        crate::StatefulRuleBuilder::new(self)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::MissingCondition`] if [`when`](Self::when) was
    /// never called.
    pub fn build(self) -> Result<BasicRule, EngineError> {
        let parts = self.into_parts()?;
        Ok(BasicRule {
            core: parts.core,
            then: parts.then,
            otherwise: parts.otherwise,
        })
    }

    pub(crate) fn into_parts(self) -> Result<RuleParts, EngineError> {
        let condition = self.condition.ok_or_else(|| EngineError::MissingCondition {
            rule: self.id.clone(),
        })?;
        let core = RuleCore {
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_owned()),
            id: self.id,
            description: self.description,
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            enabled: AtomicBool::new(self.enabled),
            concerned_facts: self.concerned_facts,
            condition,
        };
        Ok(RuleParts {
            core,
            then: self.then.unwrap_or_else(|| Box::new(NoopAction)),
            otherwise: self.otherwise.unwrap_or_else(|| Box::new(NoopAction)),
        })
    }
}

/// A stateless rule: every match runs `then`, every miss runs `else`.
pub struct BasicRule {
    core: RuleCore,
    then: Box<dyn Action>,
    otherwise: Box<dyn Action>,
}

impl Rule for BasicRule {
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
        self.then.execute(fact)
    }

    fn execute_else(&self, fact: &Arc<Fact>) -> Result<(), EvalError> {
        self.otherwise.execute(fact)
    }
}

impl fmt::Debug for BasicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicRule")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field, predicate};

    #[test]
    fn defaults_applied() {
        let rule = RuleBuilder::new("r1")
            .when(predicate(|_| true))
            .build()
            .unwrap();
        assert_eq!(rule.id(), "r1");
        assert_eq!(rule.name(), DEFAULT_NAME);
        assert_eq!(rule.description(), "");
        assert_eq!(rule.priority(), i32::MAX - 1);
        assert!(rule.is_enabled());
    }

    #[test]
    fn missing_condition_is_an_error() {
        let result = RuleBuilder::new("bad").priority(1).build();
        assert!(matches!(
            result,
            Err(EngineError::MissingCondition { rule }) if rule == "bad"
        ));
    }

    #[test]
    fn concerned_facts_filter() {
        let rule = RuleBuilder::new("r")
            .concerned_fact("boiler-1")
            .concerned_fact("boiler-2")
            .when(predicate(|_| true))
            .build()
            .unwrap();
        assert!(rule.pre_evaluate(&Fact::new("boiler-1")));
        assert!(rule.pre_evaluate(&Fact::new("boiler-2")));
        assert!(!rule.pre_evaluate(&Fact::new("pump-1")));
    }

    #[test]
    fn no_filter_accepts_everything() {
        let rule = RuleBuilder::new("r").when(predicate(|_| true)).build().unwrap();
        assert!(rule.pre_evaluate(&Fact::new("anything")));
    }

    #[test]
    fn disabled_rule_never_matches() {
        let rule = RuleBuilder::new("r")
            .when(field("v").eq(1_i64))
            .build()
            .unwrap();
        let fact = Fact::new("f").set("v", 1_i64);
        assert_eq!(rule.evaluate(&fact), Ok(true));
        rule.disable();
        assert!(!rule.is_enabled());
        assert_eq!(rule.evaluate(&fact), Ok(false));
        rule.enable();
        assert_eq!(rule.evaluate(&fact), Ok(true));
    }

    #[test]
    fn built_disabled() {
        let rule = RuleBuilder::new("r")
            .disabled()
            .when(predicate(|_| true))
            .build()
            .unwrap();
        assert!(!rule.is_enabled());
    }

    #[test]
    fn condition_errors_propagate() {
        let rule = RuleBuilder::new("r")
            .when(|_: &Fact| -> Result<bool, EvalError> { Err(EvalError::failed("bad value")) })
            .build()
            .unwrap();
        assert_eq!(
            rule.evaluate(&Fact::new("f")),
            Err(EvalError::failed("bad value"))
        );
    }
}
