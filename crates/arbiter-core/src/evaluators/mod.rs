//! Evaluators turn a context into zero or one [`Evaluation`].
//!
//! Each evaluator is independent: it sees only the request context, never
//! another evaluator's output. The agent runs them in order and hands the
//! collected evaluations to a scoring strategy.

mod json_rule;
mod static_evaluator;

pub use json_rule::{JsonRuleEvaluator, DEFAULT_SOURCE};
pub use static_evaluator::StaticEvaluator;

use crate::context::Context;
use crate::trace::TraceCollector;
use crate::types::Evaluation;

/// Trait implemented by every evaluator.
///
/// Implementations must be `Send + Sync` so one agent can serve concurrent
/// requests.
pub trait Evaluator: Send + Sync {
    /// Identity recorded as [`Evaluation::source`].
    fn name(&self) -> &str;

    /// Evaluate `context`, returning `None` when nothing applies.
    fn evaluate(&self, context: &Context) -> Option<Evaluation>;

    /// Same as [`Evaluator::evaluate`], recording rule traces into `traces`.
    ///
    /// Evaluators without rules have nothing to record.
    fn evaluate_traced(&self, context: &Context, traces: &mut TraceCollector) -> Option<Evaluation> {
        let _ = traces;
        self.evaluate(context)
    }
}
