mod action;
mod condition;
mod config;
mod expr;
mod fact;
mod rule;
mod value;

pub use action::{effect, Action, Effect, NoopAction};
pub use condition::{predicate, AllOf, AnyOf, Condition, Predicate};
pub use config::{EngineConfig, EngineConfigBuilder, SkipPolicy};
pub use expr::{field, CompareOp, Expr, FieldExpr};
pub use fact::Fact;
pub(crate) use rule::{RuleCore, RuleParts};
pub use rule::{BasicRule, Rule, RuleBuilder, DEFAULT_NAME, DEFAULT_PRIORITY};
pub use value::Value;
