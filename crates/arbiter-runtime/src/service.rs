//! Async decision service.
//!
//! The core agent is synchronous and may block inside `fetch_from_api`. The
//! service runs it on tokio's blocking pool, bounds every call with the
//! configured timeout, and fans batches out concurrently.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use arbiter_core::{Agent, Context, Decision, RuleTrace};

use crate::config::RuntimeConfig;
use crate::RuntimeError;

/// Async front end for a shared [`Agent`].
#[derive(Debug, Clone)]
pub struct DecisionService {
    agent: Arc<Agent>,
    config: RuntimeConfig,
}

impl DecisionService {
    pub fn new(agent: Arc<Agent>, config: RuntimeConfig) -> Self {
        Self { agent, config }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Decide for one context.
    ///
    /// On timeout the call returns [`RuntimeError::Timeout`]; the blocking
    /// evaluation keeps running to completion and its result is discarded.
    pub async fn decide(&self, context: Context, feedback: Option<Value>) -> Result<Decision, RuntimeError> {
        let decision = self
            .run_blocking(move |agent| agent.decide(&context, feedback.as_ref()))
            .await?;
        debug!(decision = %decision.decision, confidence = decision.confidence, "Decision ready");
        Ok(decision)
    }

    /// Decide and return the rule traces alongside the decision.
    pub async fn decide_traced(
        &self,
        context: Context,
        feedback: Option<Value>,
    ) -> Result<(Decision, Vec<RuleTrace>), RuntimeError> {
        self.run_blocking(move |agent| agent.decide_traced(&context, feedback.as_ref()))
            .await
    }

    async fn run_blocking<T, F>(&self, call: F) -> Result<T, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce(&Agent) -> T + Send + 'static,
    {
        let agent = Arc::clone(&self.agent);
        let task = tokio::task::spawn_blocking(move || call(agent.as_ref()));

        let timeout = self.config.decide_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                warn!(error = %e, "Decision task failed");
                Err(RuntimeError::Join(e.to_string()))
            }
            Err(_) => {
                warn!(timeout = ?timeout, "Decision timed out");
                Err(RuntimeError::Timeout(timeout))
            }
        }
    }

    /// Decide for every context concurrently. Results keep input order.
    pub async fn decide_batch(&self, contexts: Vec<Context>) -> Vec<Result<Decision, RuntimeError>> {
        join_all(contexts.into_iter().map(|context| self.decide(context, None))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arbiter_core::{Evaluation, Evaluator, JsonRuleEvaluator};
    use serde_json::json;

    struct SlowEvaluator(Duration);

    impl Evaluator for SlowEvaluator {
        fn name(&self) -> &str {
            "slow"
        }

        fn evaluate(&self, _context: &Context) -> Option<Evaluation> {
            std::thread::sleep(self.0);
            Evaluation::new("late", 1.0, None, "slow").ok()
        }
    }

    fn tier_service() -> DecisionService {
        let rules = JsonRuleEvaluator::from_value(&json!({
            "version": "1",
            "rules": [
                {"id": "gold", "if": {"field": "spend", "op": "gte", "value": 1000}, "then": {"decision": "gold"}},
                {"id": "silver", "if": {"field": "spend", "op": "gte", "value": 100}, "then": {"decision": "silver"}}
            ]
        }))
        .unwrap();
        let config = RuntimeConfig::default();
        let agent = config.agent_builder().evaluator(rules).build().unwrap();
        DecisionService::new(Arc::new(agent), config)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decide() {
        let service = tier_service();
        let decision = service
            .decide(Context::from_value(json!({"spend": 5000})), None)
            .await
            .unwrap();
        assert_eq!(decision.decision, "gold");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_decide_traced() {
        let service = tier_service();
        let (decision, traces) = service
            .decide_traced(Context::from_value(json!({"spend": 150})), None)
            .await
            .unwrap();
        assert_eq!(decision.decision, "silver");
        let ids: Vec<&str> = traces.iter().map(|t| t.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["gold", "silver"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_preserves_order() {
        let service = tier_service();
        let contexts = [5000, 10, 150, 1000]
            .into_iter()
            .map(|spend| Context::from_value(json!({ "spend": spend })))
            .collect();

        let decisions: Vec<String> = service
            .decide_batch(contexts)
            .await
            .into_iter()
            .map(|result| result.unwrap().decision)
            .collect();
        assert_eq!(decisions, vec!["gold", "no_decision", "silver", "gold"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_timeout() {
        let config = RuntimeConfig {
            decide_timeout: Duration::from_millis(20),
            ..RuntimeConfig::default()
        };
        let agent = config
            .agent_builder()
            .evaluator(SlowEvaluator(Duration::from_millis(500)))
            .build()
            .unwrap();
        let service = DecisionService::new(Arc::new(agent), config);

        let result = service.decide(Context::default(), None).await;
        assert!(matches!(result, Err(RuntimeError::Timeout(t)) if t == Duration::from_millis(20)));
    }
}
