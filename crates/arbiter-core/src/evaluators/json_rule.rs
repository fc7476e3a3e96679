//! First-match-wins evaluation of a rule set.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, trace};

use super::Evaluator;
use crate::context::Context;
use crate::interpreter::ConditionEvaluator;
use crate::rules::{Rule, RuleSet, RuleSetError};
use crate::trace::{RuleTrace, TraceCollector};
use crate::types::Evaluation;

/// Source name used when none is given.
pub const DEFAULT_SOURCE: &str = "json_rule_evaluator";

/// Evaluator backed by one validated [`RuleSet`].
///
/// Rules are walked in declaration order and the first rule whose condition
/// holds produces the evaluation; later rules are not examined.
#[derive(Debug, Clone)]
pub struct JsonRuleEvaluator {
    name: String,
    rules: RuleSet,
    conditions: ConditionEvaluator,
}

impl JsonRuleEvaluator {
    /// Create an evaluator over an already validated rule set.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            name: DEFAULT_SOURCE.to_string(),
            rules,
            conditions: ConditionEvaluator::new(),
        }
    }

    /// Validate `document` and build an evaluator from it.
    ///
    /// Validation is run against the built-in operators; use
    /// [`RuleSet::from_value_with`] and [`JsonRuleEvaluator::new`] for custom ones.
    pub fn from_value(document: &Value) -> Result<Self, RuleSetError> {
        Ok(Self::new(RuleSet::from_value(document)?))
    }

    pub fn from_json(json: &str) -> Result<Self, RuleSetError> {
        Ok(Self::new(RuleSet::from_json(json)?))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RuleSetError> {
        Ok(Self::new(RuleSet::from_yaml(yaml)?))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        Ok(Self::new(RuleSet::from_json_file(path)?))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        Ok(Self::new(RuleSet::from_yaml_file(path)?))
    }

    /// Set the name recorded as the evaluation source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a configured condition evaluator (registry, enrichment, clock).
    pub fn with_conditions(mut self, conditions: ConditionEvaluator) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    fn to_evaluation(&self, rule: &Rule) -> Option<Evaluation> {
        match Evaluation::new(
            rule.decision(),
            rule.weight(),
            rule.reason().map(str::to_string),
            self.name.as_str(),
        ) {
            Ok(evaluation) => Some(evaluation.with_rule_id(rule.id())),
            Err(e) => {
                // Unreachable for validated rules.
                debug!(rule_id = %rule.id(), error = %e, "Rule produced an invalid evaluation");
                None
            }
        }
    }
}

impl Evaluator for JsonRuleEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, context: &Context) -> Option<Evaluation> {
        let matched = self
            .rules
            .rules()
            .iter()
            .find(|rule| self.conditions.evaluate(rule.condition(), context))?;

        trace!(evaluator = %self.name, rule_id = %matched.id(), "Rule matched");
        self.to_evaluation(matched)
    }

    fn evaluate_traced(&self, context: &Context, traces: &mut TraceCollector) -> Option<Evaluation> {
        for rule in self.rules.rules() {
            let mut condition_traces = Vec::new();
            let matched = self
                .conditions
                .evaluate_traced(rule.condition(), context, &mut condition_traces);

            traces.push(RuleTrace {
                rule_id: rule.id().to_string(),
                matched,
                condition_traces,
                decision: rule.decision().to_string(),
                weight: rule.weight(),
                reason: rule.reason().map(str::to_string),
            });

            if matched {
                trace!(evaluator = %self.name, rule_id = %rule.id(), "Rule matched");
                return self.to_evaluation(rule);
            }
        }

        None
    }
}
