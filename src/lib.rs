mod collector;
mod dispatch;
mod engine;
mod error;
mod evaluate;
pub mod parse;
mod registry;
mod scheduler;
mod stateful;
mod types;

pub use collector::{FactCollector, QueueCollector};
pub use dispatch::EngineStats;
pub use engine::RuleEngine;
pub use error::{CollectError, EngineError, EvalError};
pub use registry::RuleRegistry;
pub use scheduler::{ScheduledTask, Scheduler};
pub use stateful::{StatefulRuleBuilder, StatefulTriggerRule, TriggerScope};
pub use types::{
    Action, AllOf, AnyOf, BasicRule, CompareOp, Condition, DEFAULT_NAME, DEFAULT_PRIORITY, Effect,
    EngineConfig, EngineConfigBuilder, Expr, Fact, FieldExpr, NoopAction, Predicate, Rule,
    RuleBuilder, SkipPolicy, Value, effect, field, predicate,
};
