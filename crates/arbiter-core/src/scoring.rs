//! Scoring strategies: reduce evaluations to one decision.
//!
//! Every strategy is a pure function of its input list. None of them fail:
//! an empty list yields [`Decision::no_decision`], and degenerate inputs
//! (all-zero weights, no majority) yield an explicit low-confidence result.

use serde::{Deserialize, Serialize};

use crate::types::{Decision, Evaluation, INCONCLUSIVE, NO_DECISION};

/// Default cutoff for [`ScoringStrategy::Threshold`].
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Default fallback decision for [`ScoringStrategy::Threshold`].
pub const DEFAULT_FALLBACK: &str = "review";

/// How evaluations are combined.
///
/// Serialized with a `type` tag so the choice can live in configuration:
///
/// ```yaml
/// type: threshold
/// threshold: 0.8
/// fallback: manual_review
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Highest summed weight per decision wins; confidence is that share of
    /// the total weight.
    #[default]
    WeightedAverage,

    /// The single heaviest evaluation wins; confidence is its weight.
    MaxWeight,

    /// A strict majority by count wins; confidence is the agreeing fraction.
    Consensus,

    /// Weighted average, replaced by `fallback` unless confidence exceeds
    /// `threshold`.
    Threshold {
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default = "default_fallback")]
        fallback: String,
    },
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_fallback() -> String {
    DEFAULT_FALLBACK.to_string()
}

impl ScoringStrategy {
    /// Threshold strategy with the default cutoff and fallback.
    pub fn threshold() -> Self {
        ScoringStrategy::Threshold {
            threshold: DEFAULT_THRESHOLD,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    /// Short name used in explanations and logs.
    pub fn name(&self) -> &'static str {
        match self {
            ScoringStrategy::WeightedAverage => "weighted_average",
            ScoringStrategy::MaxWeight => "max_weight",
            ScoringStrategy::Consensus => "consensus",
            ScoringStrategy::Threshold { .. } => "threshold",
        }
    }

    /// Reduce `evaluations` to one decision.
    pub fn score(&self, evaluations: &[Evaluation]) -> Decision {
        if evaluations.is_empty() {
            return Decision::no_decision();
        }

        let (decision, confidence, summary) = match self {
            ScoringStrategy::WeightedAverage => weighted_average(evaluations),
            ScoringStrategy::MaxWeight => max_weight(evaluations),
            ScoringStrategy::Consensus => consensus(evaluations),
            ScoringStrategy::Threshold { threshold, fallback } => {
                let (winner, confidence, _) = weighted_average(evaluations);
                if confidence > *threshold {
                    let summary = format!(
                        "threshold: {} confidence {:.2} exceeds {:.2}",
                        winner, confidence, threshold
                    );
                    (winner, confidence, summary)
                } else {
                    let summary = format!(
                        "threshold: {} confidence {:.2} does not exceed {:.2}, falling back to {}",
                        winner, confidence, threshold, fallback
                    );
                    (fallback.clone(), confidence, summary)
                }
            }
        };

        let mut explanations: Vec<String> = evaluations.iter().map(Evaluation::explain).collect();
        explanations.push(summary);

        Decision {
            decision,
            confidence: confidence.clamp(0.0, 1.0),
            explanations,
            evaluations: evaluations.to_vec(),
        }
    }
}

/// Per-decision totals in order of first appearance.
fn group<F>(evaluations: &[Evaluation], amount: F) -> Vec<(&str, f64)>
where
    F: Fn(&Evaluation) -> f64,
{
    let mut groups: Vec<(&str, f64)> = Vec::new();
    for evaluation in evaluations {
        match groups.iter_mut().find(|(d, _)| *d == evaluation.decision()) {
            Some((_, total)) => *total += amount(evaluation),
            None => groups.push((evaluation.decision(), amount(evaluation))),
        }
    }
    groups
}

/// Largest group; ties go to the group seen first.
fn largest<'a>(groups: &[(&'a str, f64)]) -> Option<(&'a str, f64)> {
    groups
        .iter()
        .copied()
        .fold(None, |best, (decision, total)| match best {
            Some((_, best_total)) if total <= best_total => best,
            _ => Some((decision, total)),
        })
}

fn weighted_average(evaluations: &[Evaluation]) -> (String, f64, String) {
    let groups = group(evaluations, Evaluation::weight);
    let total: f64 = groups.iter().map(|(_, w)| w).sum();
    let Some((decision, sum)) = largest(&groups) else {
        return (NO_DECISION.to_string(), 0.0, "weighted average: nothing to score".to_string());
    };

    let confidence = if total > 0.0 { sum / total } else { 0.0 };
    let summary = format!(
        "weighted average: {} with {:.2} of {:.2} total weight",
        decision, sum, total
    );
    (decision.to_string(), confidence, summary)
}

fn max_weight(evaluations: &[Evaluation]) -> (String, f64, String) {
    let best = evaluations
        .iter()
        .fold(None::<&Evaluation>, |best, evaluation| match best {
            Some(b) if evaluation.weight() <= b.weight() => Some(b),
            _ => Some(evaluation),
        });
    let Some(best) = best else {
        return (NO_DECISION.to_string(), 0.0, "max weight: nothing to score".to_string());
    };

    let summary = format!(
        "max weight: {} from {} (weight {:.2})",
        best.decision(),
        best.source(),
        best.weight()
    );
    (best.decision().to_string(), best.weight(), summary)
}

fn consensus(evaluations: &[Evaluation]) -> (String, f64, String) {
    let count = evaluations.len();
    let groups = group(evaluations, |_| 1.0);

    match largest(&groups) {
        Some((decision, agreeing)) if agreeing * 2.0 > count as f64 => {
            let summary = format!(
                "consensus: {} of {} evaluations agree on {}",
                agreeing, count, decision
            );
            (decision.to_string(), agreeing / count as f64, summary)
        }
        _ => (
            INCONCLUSIVE.to_string(),
            0.0,
            format!("consensus: no strict majority among {} evaluations", count),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eval(decision: &str, weight: f64) -> Evaluation {
        Evaluation::new(decision, weight, None, "test").unwrap()
    }

    fn sample() -> Vec<Evaluation> {
        vec![eval("approve", 0.9), eval("approve", 0.1), eval("reject", 0.5)]
    }

    #[test]
    fn test_empty_input_is_no_decision() {
        for strategy in [
            ScoringStrategy::WeightedAverage,
            ScoringStrategy::MaxWeight,
            ScoringStrategy::Consensus,
            ScoringStrategy::threshold(),
        ] {
            let decision = strategy.score(&[]);
            assert_eq!(decision.decision, NO_DECISION, "{}", strategy.name());
            assert_eq!(decision.confidence, 0.0);
            assert!(decision.evaluations.is_empty());
        }
    }

    #[test]
    fn test_weighted_average() {
        let decision = ScoringStrategy::WeightedAverage.score(&sample());
        assert_eq!(decision.decision, "approve");
        assert!((decision.confidence - 1.0 / 1.5).abs() < 1e-9);
        assert_eq!(decision.explanations.len(), 4);
        assert_eq!(decision.explanations[0], "test: approve (weight 0.90)");
        assert_eq!(
            decision.explanations[3],
            "weighted average: approve with 1.00 of 1.50 total weight"
        );
        assert_eq!(decision.evaluations, sample());
    }

    #[test]
    fn test_weighted_average_zero_weights() {
        let decision = ScoringStrategy::WeightedAverage.score(&[eval("a", 0.0), eval("b", 0.0)]);
        assert_eq!(decision.decision, "a");
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_weighted_average_tie_goes_to_first_seen() {
        let decision = ScoringStrategy::WeightedAverage.score(&[eval("b", 0.5), eval("a", 0.5)]);
        assert_eq!(decision.decision, "b");
        assert_eq!(decision.confidence, 0.5);
    }

    #[test]
    fn test_max_weight() {
        let decision = ScoringStrategy::MaxWeight.score(&sample());
        assert_eq!(decision.decision, "approve");
        assert_eq!(decision.confidence, 0.9);

        let tied = ScoringStrategy::MaxWeight.score(&[eval("first", 0.8), eval("second", 0.8)]);
        assert_eq!(tied.decision, "first");
    }

    #[test]
    fn test_consensus() {
        let decision = ScoringStrategy::Consensus.score(&sample());
        assert_eq!(decision.decision, "approve");
        assert!((decision.confidence - 2.0 / 3.0).abs() < 1e-9);

        let split = ScoringStrategy::Consensus.score(&[eval("a", 1.0), eval("b", 1.0)]);
        assert_eq!(split.decision, INCONCLUSIVE);
        assert_eq!(split.confidence, 0.0);
        assert!(!split.is_conclusive());

        let plurality = ScoringStrategy::Consensus.score(&[eval("a", 1.0), eval("b", 1.0), eval("c", 1.0)]);
        assert_eq!(plurality.decision, INCONCLUSIVE);
    }

    #[test]
    fn test_consensus_ignores_weight() {
        let decision = ScoringStrategy::Consensus.score(&[eval("a", 0.1), eval("a", 0.1), eval("b", 1.0)]);
        assert_eq!(decision.decision, "a");
    }

    #[test]
    fn test_threshold() {
        let high = ScoringStrategy::Threshold {
            threshold: 0.6,
            fallback: "manual".into(),
        };
        let decision = high.score(&sample());
        assert_eq!(decision.decision, "approve");

        let strict = ScoringStrategy::threshold();
        let decision = strict.score(&sample());
        assert_eq!(decision.decision, DEFAULT_FALLBACK);
        assert!((decision.confidence - 1.0 / 1.5).abs() < 1e-9);
        assert!(decision.explanations.last().unwrap().contains("falling back to review"));
    }

    #[test]
    fn test_confidence_at_cutoff_falls_back() {
        let strategy = ScoringStrategy::Threshold {
            threshold: 0.5,
            fallback: "review".into(),
        };
        let decision = strategy.score(&[eval("a", 0.5), eval("b", 0.5)]);
        assert_eq!(decision.decision, "review");
        assert!((decision.confidence - 0.5).abs() < 1e-9);

        let decision = strategy.score(&[eval("a", 0.6), eval("b", 0.4)]);
        assert_eq!(decision.decision, "a");
    }

    #[test]
    fn test_serde_tagging() {
        let strategy: ScoringStrategy = serde_json::from_str(r#"{"type": "threshold"}"#).unwrap();
        assert_eq!(strategy, ScoringStrategy::threshold());

        let strategy: ScoringStrategy =
            serde_yaml::from_str("type: threshold\nthreshold: 0.9\nfallback: escalate\n").unwrap();
        assert_eq!(
            strategy,
            ScoringStrategy::Threshold {
                threshold: 0.9,
                fallback: "escalate".into()
            }
        );

        let strategy: ScoringStrategy = serde_json::from_str(r#"{"type": "max_weight"}"#).unwrap();
        assert_eq!(strategy, ScoringStrategy::MaxWeight);
        assert_eq!(
            serde_json::to_value(ScoringStrategy::Consensus).unwrap(),
            serde_json::json!({"type": "consensus"})
        );
    }

    fn arb_evaluations() -> impl Strategy<Value = Vec<Evaluation>> {
        proptest::collection::vec(
            (prop::sample::select(vec!["approve", "reject", "review"]), 0.0f64..=1.0),
            0..12,
        )
        .prop_map(|items| items.into_iter().map(|(d, w)| eval(d, w)).collect())
    }

    proptest! {
        #[test]
        fn prop_confidence_is_bounded(evaluations in arb_evaluations()) {
            for strategy in [
                ScoringStrategy::WeightedAverage,
                ScoringStrategy::MaxWeight,
                ScoringStrategy::Consensus,
                ScoringStrategy::threshold(),
            ] {
                let decision = strategy.score(&evaluations);
                prop_assert!((0.0..=1.0).contains(&decision.confidence));
                prop_assert_eq!(decision.evaluations.len(), evaluations.len());
            }
        }
    }
}
