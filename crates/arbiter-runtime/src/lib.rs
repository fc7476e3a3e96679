//! # arbiter-runtime
//!
//! Async service layer for Arbiter.
//!
//! The core evaluation in `arbiter-core` is synchronous and has no scheduler
//! of its own. This crate adds what a long-running service needs around it:
//!
//! - [`DecisionService`]: per-call timeouts and concurrent batch decisions
//! - [`QueuedAuditSink`]: non-blocking audit delivery to an async backend
//! - [`RuntimeConfig`]: YAML/JSON service configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use arbiter_core::JsonRuleEvaluator;
//! use arbiter_runtime::{DecisionService, MemoryAuditBackend, QueuedAuditSink, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_yaml_file("arbiter.yaml")?;
//! let backend = Arc::new(MemoryAuditBackend::new());
//! let (sink, worker) = QueuedAuditSink::spawn(backend.clone(), config.audit.queue_capacity);
//!
//! let agent = config
//!     .agent_builder()
//!     .evaluator(JsonRuleEvaluator::from_yaml_file("loan.yaml")?)
//!     .audit_sink(Arc::new(sink))
//!     .build()?;
//!
//! let service = DecisionService::new(Arc::new(agent), config);
//! let decision = service.decide(context, None).await?;
//! ```

pub mod audit;
pub mod config;
pub mod service;

use std::time::Duration;

use thiserror::Error;

pub use audit::{AuditBackend, MemoryAuditBackend, QueuedAuditSink};
pub use config::{AuditConfig, RuntimeConfig};
pub use service::DecisionService;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Decision timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decision task failed: {0}")]
    Join(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
