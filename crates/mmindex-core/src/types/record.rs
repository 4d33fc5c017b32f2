//! Persisted records and search results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata attached to a document.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Metadata filter: every entry must equal the stored value.
pub type MetadataFilter = HashMap<String, serde_json::Value>;

/// Reserved metadata keys written by the engine.
pub mod keys {
    /// Name of the pattern that produced the document.
    pub const PATTERN: &str = "pattern";
    /// Document identifier.
    pub const DOC_ID: &str = "doc_id";
    /// Object store reference to the original image.
    pub const IMAGE_REF: &str = "__img_ref";
    /// Object store reference to the original text.
    pub const TEXT_REF: &str = "__text_ref";
    /// Embedding slot name on secondary slot records.
    pub const SLOT: &str = "__slot";
    /// Owning document id on secondary slot records.
    pub const PARENT_ID: &str = "__parent_id";
    /// Secondary slot names on a primary record that has any.
    pub const SLOTS: &str = "__slots";
    /// Batch identifier on batch-ingested documents.
    pub const BATCH_ID: &str = "batch_id";
    /// Input position on batch-ingested documents.
    pub const BATCH_INDEX: &str = "batch_index";

    /// Every key the engine writes itself.
    pub const RESERVED: &[&str] = &[
        PATTERN,
        DOC_ID,
        IMAGE_REF,
        TEXT_REF,
        SLOT,
        PARENT_ID,
        SLOTS,
        BATCH_ID,
        BATCH_INDEX,
    ];

    /// Whether `key` is written by the engine.
    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}

/// A vector with its metadata, as handed to a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Metadata payload.
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Create a new vector record.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    /// Get a metadata value as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Name of the pattern that produced this record.
    pub fn pattern(&self) -> Option<&str> {
        self.get_string(keys::PATTERN)
    }
}

/// A scored hit returned by a vector store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Unique identifier.
    pub id: String,
    /// Similarity score (higher is more similar).
    pub score: f32,
    /// Stored metadata.
    pub metadata: Metadata,
}

/// A ranked search result returned by the ingestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document identifier.
    pub id: String,
    /// Similarity score (higher is more similar).
    pub score: f32,
    /// Stored metadata.
    pub metadata: Metadata,
    /// Original image fetched through `__img_ref`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_image: Option<Vec<u8>>,
    /// Original text fetched through `__text_ref`, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl From<VectorMatch> for SearchResult {
    fn from(hit: VectorMatch) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            metadata: hit.metadata,
            original_image: None,
            original_text: None,
        }
    }
}

impl SearchResult {
    /// Name of the pattern that produced this document.
    pub fn pattern(&self) -> Option<&str> {
        self.metadata.get(keys::PATTERN).and_then(|v| v.as_str())
    }
}
