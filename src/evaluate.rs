use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{guarded, EvalError};
use crate::{Fact, Rule, RuleRegistry, SkipPolicy};

/// Result of running one rule against one fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// `pre_evaluate` rejected the fact; no action ran.
    Skipped,
    Applied,
    NotApplied,
}

/// Why a priority walk ended before the last rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    FirstApplied,
    FirstNonApplied,
    FirstFailed,
}

/// What happened to one fact during a priority walk, in walk order.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct WalkReport {
    pub(crate) applied: Vec<String>,
    pub(crate) not_applied: Vec<String>,
    pub(crate) failed: Vec<String>,
    pub(crate) stopped_by: Option<StopReason>,
}

/// Evaluate `rule` against `fact` and run the matching action.
///
/// A failing or panicking condition runs neither action.
pub(crate) fn run_single(rule: &dyn Rule, fact: &Arc<Fact>) -> Result<Outcome, EvalError> {
    guarded(|| {
        if !rule.pre_evaluate(fact) {
            return Ok(Outcome::Skipped);
        }
        if rule.evaluate(fact)? {
            rule.execute_then(fact)?;
            Ok(Outcome::Applied)
        } else {
            rule.execute_else(fact)?;
            Ok(Outcome::NotApplied)
        }
    })
}

/// Walk `registry` in descending priority, stopping as `policy` dictates.
pub(crate) fn priority_walk(
    registry: &RuleRegistry,
    fact: &Arc<Fact>,
    policy: SkipPolicy,
) -> WalkReport {
    let mut report = WalkReport::default();
    registry.for_each(|rule| {
        if !rule.is_enabled() {
            return ControlFlow::Continue(());
        }
        let (list, stop, reason) = match run_single(rule.as_ref(), fact) {
            Ok(Outcome::Skipped) => return ControlFlow::Continue(()),
            Ok(Outcome::Applied) => (
                &mut report.applied,
                policy.skip_on_first_applied_rule,
                StopReason::FirstApplied,
            ),
            Ok(Outcome::NotApplied) => (
                &mut report.not_applied,
                policy.skip_on_first_non_applied_rule,
                StopReason::FirstNonApplied,
            ),
            Err(e) => {
                error!(rule = %rule.id(), fact = %fact.id(), error = %e, "rule failed");
                (
                    &mut report.failed,
                    policy.skip_on_first_failed_rule,
                    StopReason::FirstFailed,
                )
            }
        };
        list.push(rule.id().to_owned());
        if stop {
            report.stopped_by = Some(reason);
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    debug!(
        fact = %fact.id(),
        applied = report.applied.len(),
        not_applied = report.not_applied.len(),
        failed = report.failed.len(),
        stopped_by = ?report.stopped_by,
        "priority walk finished"
    );
    report
}
