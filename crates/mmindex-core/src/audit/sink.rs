//! Destinations for audit records.

use std::sync::Mutex;

use tokio::sync::broadcast;

use super::AuditRecord;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Receives every completed audit record.
pub trait AuditSink: Send + Sync {
    /// Write one record. Sinks must not fail the operation being audited.
    fn write(&self, record: &AuditRecord);
}

/// Emits records as structured `tracing` events on target `mmindex::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write(&self, record: &AuditRecord) {
        let context = serde_json::to_string(&record.context).unwrap_or_default();
        if record.is_success() {
            tracing::info!(
                target: "mmindex::audit",
                correlation_id = %record.correlation_id,
                parent_correlation_id = record.parent_correlation_id.as_deref(),
                operation = %record.operation,
                outcome = %record.outcome,
                duration_ms = record.duration_ms,
                document_id = record.document_id.as_deref(),
                pattern = record.pattern.as_deref(),
                context = %context,
                "operation completed"
            );
        } else {
            tracing::error!(
                target: "mmindex::audit",
                correlation_id = %record.correlation_id,
                parent_correlation_id = record.parent_correlation_id.as_deref(),
                operation = %record.operation,
                outcome = %record.outcome,
                duration_ms = record.duration_ms,
                document_id = record.document_id.as_deref(),
                pattern = record.pattern.as_deref(),
                error = record.error.as_deref(),
                error_code = record.error_code.as_deref(),
                context = %context,
                "operation failed"
            );
        }
    }
}

/// Keeps records in memory, mostly for tests and inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of records written.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, record: &AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(e) => tracing::warn!("Audit sink lock poisoned, dropping record: {}", e),
        }
    }
}

/// Fans records out to subscribers over a broadcast channel.
///
/// Slow subscribers miss records rather than blocking the pipeline.
pub struct BroadcastAuditSink {
    sender: broadcast::Sender<AuditRecord>,
}

impl BroadcastAuditSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to records written after this call.
    pub fn subscribe(&self) -> AuditSubscriber {
        AuditSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for BroadcastAuditSink {
    fn write(&self, record: &AuditRecord) {
        // No subscribers is not an error.
        let _ = self.sender.send(record.clone());
    }
}

/// Subscriber to a [`BroadcastAuditSink`].
pub struct AuditSubscriber {
    receiver: broadcast::Receiver<AuditRecord>,
}

impl AuditSubscriber {
    /// Receive the next record; `None` once the sink is dropped.
    pub async fn recv(&mut self) -> Option<AuditRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Audit subscriber lagged by {} records", n);
                    continue;
                }
            }
        }
    }

    /// Receive a record without waiting.
    pub fn try_recv(&mut self) -> Option<AuditRecord> {
        self.receiver.try_recv().ok()
    }
}
