use std::fmt;

use super::Fact;
use crate::error::EvalError;

/// A boolean test over a fact.
///
/// Implementations must be safe to call concurrently from several workers
/// for different facts. Returning `Err` marks the rule as failed for that fact.
pub trait Condition: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EvalError`] when the predicate cannot be decided.
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError>;
}

impl<F> Condition for F
where
    F: Fn(&Fact) -> Result<bool, EvalError> + Send + Sync,
{
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        self(fact)
    }
}

/// Adapts an infallible closure into a [`Condition`]. See [`predicate`].
pub struct Predicate<F>(F);

impl<F> Condition for Predicate<F>
where
    F: Fn(&Fact) -> bool + Send + Sync,
{
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        Ok((self.0)(fact))
    }
}

impl<F> fmt::Debug for Predicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate")
    }
}

/// Wrap a closure that cannot fail.
///
/// ```
/// use firerule::{predicate, Condition, Fact};
///
/// let hot = predicate(|f: &Fact| f.get("v").and_then(|v| v.as_i64()).is_some_and(|v| v > 30));
/// assert_eq!(hot.evaluate(&Fact::new("t").set("v", 35_i64)), Ok(true));
/// ```
pub fn predicate<F>(f: F) -> Predicate<F>
where
    F: Fn(&Fact) -> bool + Send + Sync,
{
    Predicate(f)
}

/// True when every inner condition holds. Stops at the first `false` or error.
#[derive(Default)]
pub struct AllOf {
    conditions: Vec<Box<dyn Condition>>,
}

/// True when any inner condition holds. Stops at the first `true` or error.
#[derive(Default)]
pub struct AnyOf {
    conditions: Vec<Box<dyn Condition>>,
}

impl AllOf {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }
}

impl AnyOf {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }
}

impl Condition for AllOf {
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        for condition in &self.conditions {
            if !condition.evaluate(fact)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Condition for AnyOf {
    fn evaluate(&self, fact: &Fact) -> Result<bool, EvalError> {
        for condition in &self.conditions {
            if condition.evaluate(fact)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
