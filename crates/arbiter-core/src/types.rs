//! Core value types: evaluations and decisions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decision returned when there was nothing to score.
pub const NO_DECISION: &str = "no_decision";

/// Decision returned by consensus scoring when no value has a strict majority.
pub const INCONCLUSIVE: &str = "inconclusive";

/// Errors constructing an [`Evaluation`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Decision must not be empty")]
    EmptyDecision,

    #[error("Weight must be within [0, 1], got {0}")]
    WeightOutOfRange(f64),
}

/// One evaluator's proposed outcome for a single context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    decision: String,
    weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rule_id: Option<String>,
}

impl Evaluation {
    /// Create an evaluation. The weight must be finite and within `[0, 1]`.
    pub fn new(
        decision: impl Into<String>,
        weight: f64,
        reason: Option<String>,
        source: impl Into<String>,
    ) -> Result<Self, EvaluationError> {
        let decision = decision.into();
        if decision.is_empty() {
            return Err(EvaluationError::EmptyDecision);
        }
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(EvaluationError::WeightOutOfRange(weight));
        }

        Ok(Self {
            decision,
            weight,
            reason,
            source: source.into(),
            rule_id: None,
        })
    }

    /// Attach the id of the rule that produced this evaluation.
    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn decision(&self) -> &str {
        &self.decision
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Name of the evaluator that produced this evaluation.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    /// One-line explanation, e.g. `loan_rules: approve (weight 0.90) - Prime applicant`.
    pub fn explain(&self) -> String {
        match &self.reason {
            Some(reason) => format!(
                "{}: {} (weight {:.2}) - {}",
                self.source, self.decision, self.weight, reason
            ),
            None => format!("{}: {} (weight {:.2})", self.source, self.decision, self.weight),
        }
    }
}

/// Final outcome of one `decide` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,

    /// Within `[0, 1]`.
    pub confidence: f64,

    /// Ordered, human-readable explanation lines.
    pub explanations: Vec<String>,

    /// The evaluations that were scored, in evaluator order.
    pub evaluations: Vec<Evaluation>,
}

impl Decision {
    /// The explicit "nothing to decide on" result.
    pub fn no_decision() -> Self {
        Self {
            decision: NO_DECISION.to_string(),
            confidence: 0.0,
            explanations: vec!["No evaluations to score".to_string()],
            evaluations: Vec::new(),
        }
    }

    /// False for the `no_decision` and `inconclusive` sentinels.
    pub fn is_conclusive(&self) -> bool {
        self.decision != NO_DECISION && self.decision != INCONCLUSIVE
    }
}
