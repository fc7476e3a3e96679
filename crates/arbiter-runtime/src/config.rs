//! Runtime configuration.
//!
//! ```yaml
//! strategy:
//!   type: threshold
//!   threshold: 0.8
//!   fallback: manual_review
//! decide_timeout: 250ms
//! trace: true
//! audit:
//!   queue_capacity: 4096
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use arbiter_core::{AgentBuilder, ScoringStrategy};

use crate::RuntimeError;

/// Configuration for [`crate::DecisionService`] and the agent it wraps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How evaluations are combined.
    pub strategy: ScoringStrategy,

    /// Upper bound on one `decide` call.
    #[serde(with = "duration_human")]
    pub decide_timeout: Duration,

    /// Collect rule traces for every decision.
    pub trace: bool,

    pub audit: AuditConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::default(),
            decide_timeout: Duration::from_secs(5),
            trace: false,
            audit: AuditConfig::default(),
        }
    }
}

/// Queued audit delivery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Records buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024 }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Reject settings no service could run with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.decide_timeout.is_zero() {
            return Err(RuntimeError::Config("decide_timeout must be greater than zero".into()));
        }
        if self.audit.queue_capacity == 0 {
            return Err(RuntimeError::Config("audit.queue_capacity must be at least 1".into()));
        }
        if let ScoringStrategy::Threshold { threshold, .. } = &self.strategy {
            if !(0.0..=1.0).contains(threshold) {
                return Err(RuntimeError::Config(format!(
                    "strategy.threshold must be within [0, 1], got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }

    /// An agent builder with this configuration's strategy and trace setting.
    pub fn agent_builder(&self) -> AgentBuilder {
        AgentBuilder::new()
            .strategy(self.strategy.clone())
            .trace(self.trace)
    }
}

/// Durations written as `"5s"`, `"250ms"`, `"1m 30s"`.
mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.strategy, ScoringStrategy::WeightedAverage);
        assert_eq!(config.decide_timeout, Duration::from_secs(5));
        assert!(!config.trace);
        assert_eq!(config.audit.queue_capacity, 1024);
    }

    #[test]
    fn test_from_yaml() {
        let config = RuntimeConfig::from_yaml(
            r#"
strategy:
  type: threshold
  threshold: 0.8
decide_timeout: 250ms
trace: true
audit:
  queue_capacity: 16
"#,
        )
        .unwrap();

        assert_eq!(
            config.strategy,
            ScoringStrategy::Threshold {
                threshold: 0.8,
                fallback: "review".into()
            }
        );
        assert_eq!(config.decide_timeout, Duration::from_millis(250));
        assert!(config.trace);
        assert_eq!(config.audit.queue_capacity, 16);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RuntimeConfig::from_json(r#"{"strategy": {"type": "consensus"}}"#).unwrap();
        assert_eq!(config.strategy, ScoringStrategy::Consensus);
        assert_eq!(config.decide_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            RuntimeConfig::from_yaml("decide_timeout: 0s"),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("audit:\n  queue_capacity: 0"),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("strategy:\n  type: threshold\n  threshold: 2"),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_yaml("decide_timeout: soon"),
            Err(RuntimeError::Yaml(_))
        ));
    }

    #[test]
    fn test_duration_round_trip() {
        let config = RuntimeConfig {
            decide_timeout: Duration::from_millis(1500),
            ..RuntimeConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1s 500ms\""));
        assert_eq!(RuntimeConfig::from_json(&json).unwrap(), config);
    }
}
