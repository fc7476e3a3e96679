//! # arbiter-core
//!
//! Deterministic rule evaluation engine for business policy decisions.
//!
//! Policy is written as versioned JSON (or YAML) rule sets, validated once,
//! and evaluated against per-request context data:
//!
//! 1. A rule-set document is validated by [`Validator`]; every violation is
//!    reported at once.
//! 2. [`ConditionEvaluator`] evaluates each rule's condition tree against a
//!    [`Context`]. Evaluation never fails; malformed data makes a condition
//!    `false`.
//! 3. Each [`Evaluator`] yields zero or one [`Evaluation`].
//! 4. A [`ScoringStrategy`] reduces the evaluations to one [`Decision`].
//! 5. The [`Agent`] ties it together and forwards results to an [`AuditSink`].
//!
//! ## Key Guarantees
//!
//! 1. **Fail-safe**: runtime condition errors degrade to `false`, never panic
//! 2. **Closed operator set**: unknown operators are rejected at load time
//! 3. **Traceable**: every evaluated condition can be recorded and explained
//! 4. **Concurrent**: rule sets and agents are immutable and `Send + Sync`
//!
//! ## Example
//!
//! ```rust,ignore
//! use arbiter_core::{Agent, Context, JsonRuleEvaluator, ScoringStrategy};
//!
//! let rules = JsonRuleEvaluator::from_yaml_file("loan.yaml")?;
//! let agent = Agent::builder()
//!     .evaluator(rules)
//!     .strategy(ScoringStrategy::threshold())
//!     .build()?;
//!
//! let decision = agent.decide(&Context::from_value(request), None);
//! println!("{} ({:.2})", decision.decision, decision.confidence);
//! ```

pub mod agent;
pub mod audit;
pub mod context;
pub mod enrichment;
pub mod evaluators;
pub mod interpreter;
pub mod operators;
pub mod rules;
pub mod scoring;
pub mod trace;
pub mod types;

// Re-export main types at crate root
pub use agent::{Agent, AgentBuilder, AgentError};
pub use audit::{AuditError, AuditRecord, AuditSink, NullAuditSink, TracingAuditSink};
pub use context::Context;
pub use enrichment::{Enrichment, EnrichmentError, StaticEnrichment};
pub use evaluators::{Evaluator, JsonRuleEvaluator, StaticEvaluator};
pub use interpreter::ConditionEvaluator;
pub use operators::{OperatorEnv, OperatorFn, OperatorImpl, OperatorRegistry};
pub use rules::{
    Condition, FieldCondition, Rule, RuleSet, RuleSetError, ValidationError, ValidationErrors,
    Validator,
};
pub use scoring::ScoringStrategy;
pub use trace::{ConditionTrace, RuleTrace, TraceCollector};
pub use types::{Decision, Evaluation, EvaluationError, INCONCLUSIVE, NO_DECISION};

/// Evaluate a condition against a context with the built-in operators.
///
/// Shorthand for `ConditionEvaluator::new().evaluate(condition, context)`.
pub fn evaluate(condition: &Condition, context: &Context) -> bool {
    ConditionEvaluator::new().evaluate(condition, context)
}
