//! Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::Metadata;

/// Top-level operation an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    Ingest,
    BatchIngest,
    BatchItem,
    Search,
    Delete,
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Error,
}

/// One completed operation. Never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Identifier shared by every log line of the operation.
    pub correlation_id: String,
    /// Correlation id of the enclosing batch, for batch items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_correlation_id: Option<String>,
    /// Operation kind.
    pub operation: OperationKind,
    /// When the operation started.
    pub started_at: DateTime<Utc>,
    /// When the operation ended.
    pub ended_at: DateTime<Utc>,
    /// Elapsed wall-clock time.
    pub duration_ms: u64,
    /// Success or error.
    pub outcome: AuditOutcome,
    /// Document the operation produced or touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Pattern the operation used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Additional structured context.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub context: Metadata,
}

impl AuditRecord {
    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == AuditOutcome::Success
    }
}
