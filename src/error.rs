use thiserror::Error;

/// Configuration and lifecycle errors. These fail fast at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("duplicate rule id '{id}'")]
    DuplicateRule { id: String },

    #[error("duplicate collector name '{name}'")]
    DuplicateCollector { name: String },

    #[error("trigger delay must be at least 1000ms, got {delay_ms}ms")]
    InvalidTriggerDelay { delay_ms: u128 },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("rule '{rule}' has no condition")]
    MissingCondition { rule: String },

    #[error("rule engine not started")]
    NotStarted,

    #[error("failed to spawn thread '{thread}': {reason}")]
    Spawn { thread: String, reason: String },
}

/// Failure raised by a condition or an action while evaluating a fact.
///
/// Contained per rule: logged by the engine, never returned to the caller of
/// [`RuleEngine::fire`](crate::RuleEngine::fire).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("{message}")]
    Failed { message: String },

    #[error("panicked: {message}")]
    Panicked { message: String },
}

impl EvalError {
    pub fn failed(message: impl Into<String>) -> Self {
        EvalError::Failed {
            message: message.into(),
        }
    }

    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        EvalError::Panicked { message }
    }
}

/// Failure of a single collection cycle. The schedule keeps running.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("collect failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Run `f`, turning a panic into [`EvalError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, EvalError>) -> Result<T, EvalError> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(EvalError::from_panic(payload.as_ref())),
    }
}
