//! Pre-persistence checks for embeddings and metadata.
//!
//! The [`Validator`] never short-circuits: every violation found is
//! reported so the caller can fix them all in one pass.

mod limiter;

pub use limiter::MetadataLimiter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{IndexError, IndexResult};
use crate::traits::DataType;
use crate::types::Metadata;

/// Maximum number of individual non-finite values reported.
const MAX_REPORTED_NON_FINITE: usize = 16;

/// A single reason a document cannot be persisted.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("non-finite value {value} at index {index}")]
    NonFiniteValue { index: usize, value: String },

    #[error("{count} non-finite values in total")]
    TooManyNonFinite { count: usize },

    #[error("metadata key is empty")]
    EmptyMetadataKey,

    #[error("metadata key {key:?} contains control characters")]
    ControlCharacterInKey { key: String },

    #[error("serialized metadata is {size} bytes, limit is {limit}")]
    MetadataTooLarge { size: usize, limit: usize },

    #[error("data type {actual} is not supported by an index of {expected}")]
    UnsupportedDataType { expected: DataType, actual: DataType },
}

/// Checks embeddings and metadata against the index configuration.
#[derive(Debug, Clone)]
pub struct Validator {
    max_metadata_bytes: usize,
    data_type: DataType,
}

impl Validator {
    /// Create a validator with a metadata size ceiling.
    pub fn new(max_metadata_bytes: usize) -> Self {
        Self {
            max_metadata_bytes,
            data_type: DataType::Float32,
        }
    }

    /// Set the element type the index stores.
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Metadata size ceiling in bytes.
    pub fn max_metadata_bytes(&self) -> usize {
        self.max_metadata_bytes
    }

    /// Validate one embedding and its metadata.
    pub fn validate(
        &self,
        embedding: &[f32],
        metadata: &Metadata,
        expected_dimension: usize,
    ) -> IndexResult<()> {
        let violations = self.violations(embedding, metadata, expected_dimension);
        if violations.is_empty() {
            Ok(())
        } else {
            tracing::debug!(count = violations.len(), "validation failed");
            Err(IndexError::validation(violations))
        }
    }

    /// Collect every violation without failing.
    pub fn violations(
        &self,
        embedding: &[f32],
        metadata: &Metadata,
        expected_dimension: usize,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        // Embeddings arrive as f32; any other configured type cannot hold them.
        if self.data_type != DataType::Float32 {
            violations.push(Violation::UnsupportedDataType {
                expected: self.data_type,
                actual: DataType::Float32,
            });
        }

        if embedding.len() != expected_dimension {
            violations.push(Violation::DimensionMismatch {
                expected: expected_dimension,
                actual: embedding.len(),
            });
        }

        let non_finite: Vec<(usize, f32)> = embedding
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| !v.is_finite())
            .collect();
        for (index, value) in non_finite.iter().take(MAX_REPORTED_NON_FINITE) {
            violations.push(Violation::NonFiniteValue {
                index: *index,
                value: value.to_string(),
            });
        }
        if non_finite.len() > MAX_REPORTED_NON_FINITE {
            violations.push(Violation::TooManyNonFinite {
                count: non_finite.len(),
            });
        }

        let mut keys: Vec<&String> = metadata.keys().collect();
        keys.sort();
        for key in keys {
            if key.is_empty() {
                violations.push(Violation::EmptyMetadataKey);
            } else if key.chars().any(char::is_control) {
                violations.push(Violation::ControlCharacterInKey { key: key.clone() });
            }
        }

        let size = serialized_size(metadata);
        if size > self.max_metadata_bytes {
            violations.push(Violation::MetadataTooLarge {
                size,
                limit: self.max_metadata_bytes,
            });
        }

        violations
    }
}

/// Size of the metadata serialized as compact JSON.
pub fn serialized_size(metadata: &Metadata) -> usize {
    serde_json::to_vec(metadata).map(|v| v.len()).unwrap_or(usize::MAX)
}
