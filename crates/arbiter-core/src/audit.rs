//! Audit collaborator interface.
//!
//! The agent hands every decision to an [`AuditSink`] after scoring. Sinks
//! are fire-and-forget from the agent's point of view: an error is logged
//! and the decision is returned unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::trace::RuleTrace;
use crate::types::Decision;

/// Errors an audit sink may report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("Audit queue is full")]
    QueueFull,

    #[error("Audit sink is closed")]
    Closed,

    #[error("Audit backend error: {0}")]
    Backend(String),
}

/// Everything recorded about one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub decision: Decision,

    /// Rule traces collected during the call; empty when tracing is off.
    pub traces: Vec<RuleTrace>,

    /// Caller-supplied feedback, passed through untouched.
    pub feedback: Option<Value>,

    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(decision: Decision, traces: Vec<RuleTrace>, feedback: Option<Value>) -> Self {
        Self {
            decision,
            traces,
            feedback,
            recorded_at: Utc::now(),
        }
    }
}

/// Receives decisions for recording.
///
/// Implementations own their synchronization; one sink is shared by every
/// concurrent `decide` call.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Emits one structured `tracing` event per decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let matched_rules: Vec<&str> = record
            .traces
            .iter()
            .filter(|t| t.matched)
            .map(|t| t.rule_id.as_str())
            .collect();

        info!(
            decision = %record.decision.decision,
            confidence = record.decision.confidence,
            evaluations = record.decision.evaluations.len(),
            matched_rules = ?matched_rules,
            feedback = record.feedback.is_some(),
            recorded_at = %record.recorded_at.to_rfc3339(),
            "Decision recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_sinks_accept_records() {
        let record = AuditRecord::new(Decision::no_decision(), Vec::new(), Some(json!({"label": "fraud"})));
        assert_eq!(NullAuditSink.record(&record), Ok(()));
        assert_eq!(TracingAuditSink.record(&record), Ok(()));
    }

    #[test]
    fn test_record_serializes() {
        let record = AuditRecord::new(Decision::no_decision(), Vec::new(), None);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["decision"]["decision"], "no_decision");
        assert!(value["recorded_at"].is_string());
        assert!(value["feedback"].is_null());
    }
}
