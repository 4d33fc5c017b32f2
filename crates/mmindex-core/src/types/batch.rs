//! Batch ingestion request and result types.

use crate::error::{BatchItemError, IndexError};
use crate::types::{ContentBundle, Metadata};

/// One item of a batch ingestion call.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    /// Caller-supplied identifier; generated when `None`.
    pub id: Option<String>,
    /// Content to ingest.
    pub content: ContentBundle,
    /// Caller metadata.
    pub metadata: Metadata,
}

impl IngestRequest {
    /// Create a request with generated id and empty metadata.
    pub fn new(content: ContentBundle) -> Self {
        Self {
            id: None,
            content,
            metadata: Metadata::new(),
        }
    }

    /// Set the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the caller metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<ContentBundle> for IngestRequest {
    fn from(content: ContentBundle) -> Self {
        Self::new(content)
    }
}

/// Outcome of a single batch item.
#[derive(Debug)]
pub enum BatchItemOutcome {
    /// The item was persisted under `doc_id`.
    Success { index: usize, doc_id: String },
    /// The item failed; siblings are unaffected.
    Failure(BatchItemError),
}

impl BatchItemOutcome {
    /// Original input position of the item.
    pub fn index(&self) -> usize {
        match self {
            BatchItemOutcome::Success { index, .. } => *index,
            BatchItemOutcome::Failure(err) => err.index,
        }
    }

    /// Whether the item succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemOutcome::Success { .. })
    }

    /// Document id for a successful item.
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            BatchItemOutcome::Success { doc_id, .. } => Some(doc_id),
            BatchItemOutcome::Failure(_) => None,
        }
    }

    /// Error for a failed item.
    pub fn error(&self) -> Option<&IndexError> {
        match self {
            BatchItemOutcome::Success { .. } => None,
            BatchItemOutcome::Failure(err) => Some(&err.error),
        }
    }
}

/// Ordered per-item outcomes of a batch, one per input item.
#[derive(Debug)]
pub struct BatchResult {
    /// Batch identifier, also written into item metadata.
    pub batch_id: String,
    /// Outcomes in input order.
    pub outcomes: Vec<BatchItemOutcome>,
    /// Wall-clock duration of the whole batch.
    pub duration_ms: u64,
}

impl BatchResult {
    /// An empty result for an empty input list.
    pub fn empty(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            outcomes: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch had no items.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of successful items.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed items.
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Whether every item succeeded.
    pub fn is_complete_success(&self) -> bool {
        self.failed() == 0
    }

    /// Document ids in input order, `None` where the item failed.
    pub fn document_ids(&self) -> Vec<Option<&str>> {
        self.outcomes.iter().map(BatchItemOutcome::doc_id).collect()
    }

    /// Failures in input order.
    pub fn errors(&self) -> impl Iterator<Item = &BatchItemError> {
        self.outcomes.iter().filter_map(|o| match o {
            BatchItemOutcome::Failure(err) => Some(err),
            BatchItemOutcome::Success { .. } => None,
        })
    }

    /// Fraction of items that succeeded, 0.0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.succeeded() as f64 / self.len() as f64
        }
    }
}
