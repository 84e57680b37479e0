use super::Fact;
use crate::error::EvalError;

/// A side effect run when a rule matches (`then`) or does not match (`else`).
pub trait Action: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EvalError`] when the side effect fails. The engine logs it
    /// and never retries.
    fn execute(&self, fact: &Fact) -> Result<(), EvalError>;
}

impl<F> Action for F
where
    F: Fn(&Fact) -> Result<(), EvalError> + Send + Sync,
{
    fn execute(&self, fact: &Fact) -> Result<(), EvalError> {
        self(fact)
    }
}

/// Does nothing. The default `else` action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl Action for NoopAction {
    fn execute(&self, _fact: &Fact) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Adapts an infallible closure into an [`Action`]. See [`effect`].
pub struct Effect<F>(F);

impl<F> Action for Effect<F>
where
    F: Fn(&Fact) + Send + Sync,
{
    fn execute(&self, fact: &Fact) -> Result<(), EvalError> {
        (self.0)(fact);
        Ok(())
    }
}

/// Wrap a closure that cannot fail.
pub fn effect<F>(f: F) -> Effect<F>
where
    F: Fn(&Fact) + Send + Sync,
{
    Effect(f)
}
