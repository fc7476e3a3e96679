//! Queued, fire-and-forget audit delivery.
//!
//! [`QueuedAuditSink`] implements the synchronous core [`AuditSink`] by
//! pushing records into a bounded channel. A background task drains the
//! channel into an async [`AuditBackend`]. `decide` never waits on storage:
//! when the queue is full the record is dropped and a warning is logged.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use arbiter_core::{AuditError, AuditRecord, AuditSink};

/// Durable destination for audit records.
#[async_trait]
pub trait AuditBackend: Send + Sync {
    async fn store(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// Keeps records in memory. For tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryAuditBackend {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AuditBackend for MemoryAuditBackend {
    async fn store(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.write().push(record);
        Ok(())
    }
}

/// Audit sink backed by a bounded queue and a background writer task.
#[derive(Debug, Clone)]
pub struct QueuedAuditSink {
    sender: mpsc::Sender<AuditRecord>,
}

impl QueuedAuditSink {
    /// Start the writer task on the current tokio runtime.
    ///
    /// The task finishes once every clone of the sink has been dropped and
    /// the queue is drained; await the returned handle to flush on shutdown.
    pub fn spawn(backend: Arc<dyn AuditBackend>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AuditRecord>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                let decision = record.decision.decision.clone();
                match backend.store(record).await {
                    Ok(()) => debug!(decision = %decision, "Audit record stored"),
                    Err(e) => warn!(decision = %decision, error = %e, "Audit backend rejected record"),
                }
            }
            debug!("Audit queue closed");
        });

        (Self { sender }, worker)
    }

    /// Free slots left in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl AuditSink for QueuedAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        match self.sender.try_send(record.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                warn!(decision = %dropped.decision.decision, "Audit queue full, dropping record");
                Err(AuditError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(AuditError::Closed),
        }
    }
}
