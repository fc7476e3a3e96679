//! Agent: evaluators + scoring strategy + optional audit in one call.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::{AuditRecord, AuditSink};
use crate::context::Context;
use crate::evaluators::Evaluator;
use crate::scoring::ScoringStrategy;
use crate::trace::{RuleTrace, TraceCollector};
use crate::types::Decision;

/// Errors building an [`Agent`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Agent requires at least one evaluator")]
    NoEvaluators,

    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Threshold fallback decision must not be empty")]
    EmptyFallback,
}

/// Runs every evaluator against a context and scores the results.
///
/// Holds no per-request state, so one `Agent` can serve concurrent callers.
pub struct Agent {
    evaluators: Vec<Arc<dyn Evaluator>>,
    strategy: ScoringStrategy,
    audit: Option<Arc<dyn AuditSink>>,
    trace: bool,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn strategy(&self) -> &ScoringStrategy {
        &self.strategy
    }

    /// Names of the configured evaluators, in evaluation order.
    pub fn evaluator_names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    /// Whether rule traces are collected on every call.
    pub fn tracing_enabled(&self) -> bool {
        self.trace
    }

    /// Decide for `context`.
    ///
    /// `feedback` is forwarded to the audit sink and has no effect on scoring.
    pub fn decide(&self, context: &Context, feedback: Option<&Value>) -> Decision {
        let (decision, traces) = self.run(context, self.trace);
        self.audit(&decision, traces, feedback);
        decision
    }

    /// Decide and also return the rule traces, whatever the agent's trace
    /// setting.
    pub fn decide_traced(&self, context: &Context, feedback: Option<&Value>) -> (Decision, Vec<RuleTrace>) {
        let (decision, traces) = self.run(context, true);
        self.audit(&decision, traces.clone(), feedback);
        (decision, traces)
    }

    fn run(&self, context: &Context, collect: bool) -> (Decision, Vec<RuleTrace>) {
        let mut collector = TraceCollector::new();
        let evaluations: Vec<_> = self
            .evaluators
            .iter()
            .filter_map(|evaluator| {
                let evaluation = if collect {
                    evaluator.evaluate_traced(context, &mut collector)
                } else {
                    evaluator.evaluate(context)
                };
                if evaluation.is_none() {
                    debug!(evaluator = %evaluator.name(), "Evaluator had no opinion");
                }
                evaluation
            })
            .collect();

        let decision = self.strategy.score(&evaluations);
        debug!(
            strategy = self.strategy.name(),
            decision = %decision.decision,
            confidence = decision.confidence,
            evaluations = evaluations.len(),
            "Decision scored"
        );

        (decision, collector.take())
    }

    fn audit(&self, decision: &Decision, traces: Vec<RuleTrace>, feedback: Option<&Value>) {
        let Some(sink) = &self.audit else {
            return;
        };
        let record = AuditRecord::new(decision.clone(), traces, feedback.cloned());
        if let Err(e) = sink.record(&record) {
            warn!(error = %e, decision = %decision.decision, "Audit sink failed, decision unaffected");
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("evaluators", &self.evaluator_names())
            .field("strategy", &self.strategy)
            .field("audit", &self.audit.is_some())
            .field("trace", &self.trace)
            .finish()
    }
}

/// Builder for [`Agent`].
#[derive(Default)]
pub struct AgentBuilder {
    evaluators: Vec<Arc<dyn Evaluator>>,
    strategy: ScoringStrategy,
    audit: Option<Arc<dyn AuditSink>>,
    trace: bool,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an evaluator. Evaluators run in the order they are added.
    pub fn evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }

    /// Append an already shared evaluator.
    pub fn shared_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    pub fn strategy(mut self, strategy: ScoringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Collect rule traces on every call and forward them to the audit sink.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        if self.evaluators.is_empty() {
            return Err(AgentError::NoEvaluators);
        }
        if let ScoringStrategy::Threshold { threshold, fallback } = &self.strategy {
            if !threshold.is_finite() || !(0.0..=1.0).contains(threshold) {
                return Err(AgentError::InvalidThreshold(*threshold));
            }
            if fallback.is_empty() {
                return Err(AgentError::EmptyFallback);
            }
        }

        Ok(Agent {
            evaluators: self.evaluators,
            strategy: self.strategy,
            audit: self.audit,
            trace: self.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditError;
    use crate::evaluators::{JsonRuleEvaluator, StaticEvaluator};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::Backend("disk full".into()))
        }
    }

    fn loan_rules() -> JsonRuleEvaluator {
        JsonRuleEvaluator::from_value(&json!({
            "version": "1",
            "rules": [
                {"id": "prime", "if": {"field": "score", "op": "gte", "value": 720},
                 "then": {"decision": "approve", "weight": 0.9, "reason": "Prime"}},
                {"id": "subprime", "if": {"field": "score", "op": "lt", "value": 600},
                 "then": {"decision": "reject", "weight": 0.8}}
            ]
        }))
        .unwrap()
        .with_name("loan")
    }

    #[test]
    fn test_build_requires_evaluator() {
        assert_eq!(Agent::builder().build().unwrap_err(), AgentError::NoEvaluators);
    }

    #[test]
    fn test_build_validates_threshold() {
        let err = Agent::builder()
            .evaluator(loan_rules())
            .strategy(ScoringStrategy::Threshold {
                threshold: 1.2,
                fallback: "review".into(),
            })
            .build()
            .unwrap_err();
        assert_eq!(err, AgentError::InvalidThreshold(1.2));
    }

    #[test]
    fn test_decide_combines_evaluators() {
        let agent = Agent::builder()
            .evaluator(loan_rules())
            .evaluator(StaticEvaluator::new("baseline", "review", 0.2, None).unwrap())
            .build()
            .unwrap();

        let decision = agent.decide(&Context::from_value(json!({"score": 750})), None);
        assert_eq!(decision.decision, "approve");
        assert!((decision.confidence - 0.9 / 1.1).abs() < 1e-9);
        assert_eq!(decision.evaluations.len(), 2);
        assert_eq!(decision.explanations[0], "loan: approve (weight 0.90) - Prime");

        let decision = agent.decide(&Context::from_value(json!({"score": 650})), None);
        assert_eq!(decision.decision, "review");
        assert_eq!(decision.evaluations.len(), 1);
    }

    #[test]
    fn test_no_matches_is_no_decision() {
        let agent = Agent::builder().evaluator(loan_rules()).build().unwrap();
        let decision = agent.decide(&Context::from_value(json!({"score": 650})), None);
        assert!(!decision.is_conclusive());
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_audit_receives_traces_and_feedback() {
        let sink = Arc::new(RecordingSink::default());
        let agent = Agent::builder()
            .evaluator(loan_rules())
            .audit_sink(sink.clone())
            .trace(true)
            .build()
            .unwrap();

        let feedback = json!({"outcome": "repaid"});
        let decision = agent.decide(&Context::from_value(json!({"score": 500})), Some(&feedback));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, decision);
        assert_eq!(records[0].feedback, Some(feedback));
        let ids: Vec<&str> = records[0].traces.iter().map(|t| t.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["prime", "subprime"]);
    }

    #[test]
    fn test_traces_off_by_default() {
        let sink = Arc::new(RecordingSink::default());
        let agent = Agent::builder()
            .evaluator(loan_rules())
            .audit_sink(sink.clone())
            .build()
            .unwrap();

        agent.decide(&Context::from_value(json!({"score": 800})), None);
        assert!(sink.records.lock().unwrap()[0].traces.is_empty());

        let (_, traces) = agent.decide_traced(&Context::from_value(json!({"score": 800})), None);
        assert_eq!(traces.len(), 1);
        assert!(traces[0].matched);
    }

    #[test]
    fn test_audit_failure_does_not_change_decision() {
        let agent = Agent::builder()
            .evaluator(loan_rules())
            .audit_sink(Arc::new(FailingSink))
            .build()
            .unwrap();
        let decision = agent.decide(&Context::from_value(json!({"score": 800})), None);
        assert_eq!(decision.decision, "approve");
    }
}
