//! Audit logging with per-operation correlation identifiers.
//!
//! Every top-level operation (ingest, batch ingest and each of its items,
//! search, delete) gets a correlation id when it starts and produces exactly
//! one [`AuditRecord`] when it ends, success or failure. Records are handed
//! to every registered [`AuditSink`].

mod record;
mod sink;

pub use record::{AuditOutcome, AuditRecord, OperationKind};
pub use sink::{AuditSink, AuditSubscriber, BroadcastAuditSink, MemoryAuditSink, TracingAuditSink};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::IndexError;
use crate::types::Metadata;

/// An operation in flight; finished through [`AuditLogger::succeed`] or
/// [`AuditLogger::fail`].
#[derive(Debug)]
pub struct OperationAudit {
    correlation_id: String,
    parent_correlation_id: Option<String>,
    operation: OperationKind,
    started_at: DateTime<Utc>,
    timer: Instant,
    document_id: Option<String>,
    pattern: Option<String>,
    context: Metadata,
}

impl OperationAudit {
    /// Correlation id of this operation.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Operation kind.
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Link to the enclosing batch.
    pub fn with_parent(mut self, parent_correlation_id: impl Into<String>) -> Self {
        self.parent_correlation_id = Some(parent_correlation_id.into());
        self
    }

    /// Record the pattern in use.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Record the document id.
    pub fn set_document_id(&mut self, id: impl Into<String>) {
        self.document_id = Some(id.into());
    }

    /// Add a context entry.
    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.context.insert(key.into(), value.into());
    }
}

/// Creates correlation ids and writes completed operations to sinks.
#[derive(Clone)]
pub struct AuditLogger {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a logger writing to `tracing`.
    pub fn new() -> Self {
        Self {
            sinks: vec![Arc::new(TracingAuditSink)],
        }
    }

    /// Create a logger with no sinks.
    pub fn silent() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Start an operation with a fresh correlation id.
    pub fn begin(&self, operation: OperationKind) -> OperationAudit {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(
            correlation_id = %correlation_id,
            operation = %operation,
            "operation started"
        );
        OperationAudit {
            correlation_id,
            parent_correlation_id: None,
            operation,
            started_at: Utc::now(),
            timer: Instant::now(),
            document_id: None,
            pattern: None,
            context: Metadata::new(),
        }
    }

    /// Log the preprocessing steps applied within an operation.
    pub fn log_preprocessing(&self, op: &OperationAudit, applied: &[String]) {
        tracing::debug!(
            correlation_id = %op.correlation_id,
            steps = ?applied,
            "preprocessing applied"
        );
    }

    /// Log the result of a pattern run within an operation.
    pub fn log_pattern_processing(&self, op: &OperationAudit, pattern: &str, embeddings: usize) {
        tracing::debug!(
            correlation_id = %op.correlation_id,
            pattern = pattern,
            embeddings = embeddings,
            "pattern processed"
        );
    }

    /// Finish an operation successfully.
    pub fn succeed(&self, op: OperationAudit) -> AuditRecord {
        let record = Self::complete(op, AuditOutcome::Success, None);
        self.emit(&record);
        record
    }

    /// Finish an operation with an error.
    pub fn fail(&self, op: OperationAudit, error: &IndexError) -> AuditRecord {
        let record = Self::complete(op, AuditOutcome::Error, Some(error));
        self.emit(&record);
        record
    }

    fn complete(
        op: OperationAudit,
        outcome: AuditOutcome,
        error: Option<&IndexError>,
    ) -> AuditRecord {
        let mut context = op.context;
        if let Some(key) = error.and_then(IndexError::key) {
            context.insert("failing_key".to_string(), key.into());
        }
        AuditRecord {
            correlation_id: op.correlation_id,
            parent_correlation_id: op.parent_correlation_id,
            operation: op.operation,
            started_at: op.started_at,
            ended_at: Utc::now(),
            duration_ms: op.timer.elapsed().as_millis() as u64,
            outcome,
            document_id: op.document_id,
            pattern: op.pattern,
            error: error.map(|e| e.to_string()),
            error_code: error.map(|e| e.code().as_str().to_string()),
            context,
        }
    }

    fn emit(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            sink.write(record);
        }
    }
}
