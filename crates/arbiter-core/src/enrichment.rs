//! External data enrichment seam used by the `fetch_from_api` operator.
//!
//! The engine never talks to the network itself. Whoever wires an agent
//! supplies an [`Enrichment`] implementation that owns transport, timeouts,
//! retries and caching; the evaluator only sees success or failure.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors an enrichment collaborator may report.
///
/// The evaluator treats every variant the same way (the operator is false);
/// the distinction exists for logs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Fetches named external data for a condition.
///
/// Implementations must be thread-safe; one instance is shared by every
/// concurrent evaluation.
pub trait Enrichment: Send + Sync {
    /// Call `endpoint` with `params`, returning the response object.
    fn fetch(&self, endpoint: &str, params: &Map<String, Value>) -> Result<Map<String, Value>, EnrichmentError>;
}

/// Serves canned responses per endpoint. Useful for tests and dry runs.
#[derive(Default, Clone)]
pub struct StaticEnrichment {
    responses: HashMap<String, Result<Map<String, Value>, EnrichmentError>>,
}

impl StaticEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `endpoint` with `response`. Non-object responses are stored as
    /// malformed.
    pub fn with_response(mut self, endpoint: impl Into<String>, response: Value) -> Self {
        let endpoint = endpoint.into();
        let entry = match response {
            Value::Object(map) => Ok(map),
            other => Err(EnrichmentError::Malformed(format!(
                "expected an object, got {}",
                other
            ))),
        };
        self.responses.insert(endpoint, entry);
        self
    }

    /// Answer `endpoint` with `error`.
    pub fn with_failure(mut self, endpoint: impl Into<String>, error: EnrichmentError) -> Self {
        self.responses.insert(endpoint.into(), Err(error));
        self
    }
}

impl fmt::Debug for StaticEnrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut endpoints: Vec<&String> = self.responses.keys().collect();
        endpoints.sort();
        f.debug_struct("StaticEnrichment")
            .field("endpoints", &endpoints)
            .finish()
    }
}

impl Enrichment for StaticEnrichment {
    fn fetch(&self, endpoint: &str, _params: &Map<String, Value>) -> Result<Map<String, Value>, EnrichmentError> {
        self.responses
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| Err(EnrichmentError::UnknownEndpoint(endpoint.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_enrichment_responses() {
        let enrichment = StaticEnrichment::new()
            .with_response("credit", json!({"score": 710}))
            .with_failure("slow", EnrichmentError::Timeout { endpoint: "slow".into() })
            .with_response("broken", json!([1, 2]));

        let params = Map::new();
        assert_eq!(
            enrichment.fetch("credit", &params).unwrap().get("score"),
            Some(&json!(710))
        );
        assert!(matches!(
            enrichment.fetch("slow", &params),
            Err(EnrichmentError::Timeout { .. })
        ));
        assert!(matches!(
            enrichment.fetch("broken", &params),
            Err(EnrichmentError::Malformed(_))
        ));
        assert_eq!(
            enrichment.fetch("missing", &params),
            Err(EnrichmentError::UnknownEndpoint("missing".into()))
        );
    }
}
