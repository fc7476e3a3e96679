//! Constant evaluator for fallbacks and trivial policies.

use super::Evaluator;
use crate::context::Context;
use crate::types::{Evaluation, EvaluationError};

/// Returns the same evaluation for every context.
#[derive(Debug, Clone)]
pub struct StaticEvaluator {
    evaluation: Evaluation,
}

impl StaticEvaluator {
    pub fn new(
        name: impl Into<String>,
        decision: impl Into<String>,
        weight: f64,
        reason: Option<String>,
    ) -> Result<Self, EvaluationError> {
        Ok(Self {
            evaluation: Evaluation::new(decision, weight, reason, name)?,
        })
    }
}

impl Evaluator for StaticEvaluator {
    fn name(&self) -> &str {
        self.evaluation.source()
    }

    fn evaluate(&self, _context: &Context) -> Option<Evaluation> {
        Some(self.evaluation.clone())
    }
}
