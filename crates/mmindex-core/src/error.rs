//! Error types for mmindex operations.
//!
//! This module provides the error hierarchy shared by every crate in the
//! workspace, with structured error codes and suggestions for resolution.
//! Batch ingestion wraps per-item failures in [`BatchItemError`] so that a
//! single bad item never aborts its siblings.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::validation::Violation;

/// Result type alias for mmindex operations.
pub type IndexResult<T> = Result<T, IndexError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Storage port that produced a [`IndexError::Storage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StoragePort {
    VectorStore,
    ObjectStore,
}

/// External capability that produced a [`IndexError::Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Embedding,
    Description,
    Summarization,
}

/// Main error type for all mmindex operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A preprocessor or pattern could not read a content field.
    #[error("Preprocessing error on '{key}': {message}")]
    Preprocessing {
        key: String,
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<BoxError>,
    },

    /// No pattern is registered under the requested name.
    #[error("Unknown pattern '{name}' (available: {})", .available.join(", "))]
    UnknownPattern { name: String, available: Vec<String> },

    /// Embedding or metadata failed pre-persistence checks.
    #[error("Validation failed with {} violation(s): {}", .violations.len(), join_violations(.violations))]
    Validation { violations: Vec<Violation> },

    /// A storage port rejected or failed an operation.
    #[error("{port} error during {operation}: {message}")]
    Storage {
        port: StoragePort,
        operation: String,
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<BoxError>,
    },

    /// An embedding, description or summarization call failed.
    #[error("{capability} error: {message}")]
    Capability {
        capability: Capability,
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<BoxError>,
    },

    /// The caller passed an argument the operation cannot accept.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Preprocessing (PRE_xxx)
    PreMissingContent,
    PreDecodeFailed,
    PreStepFailed,

    // Pattern (PAT_xxx)
    PatUnknown,

    // Validation (VAL_xxx)
    ValViolations,

    // Storage (STO_xxx)
    StoWriteFailed,
    StoReadFailed,
    StoNotFound,
    StoConnectionFailed,

    // Capability (CAP_xxx)
    CapEmbeddingFailed,
    CapDescriptionFailed,
    CapSummarizationFailed,
    CapConnectionFailed,

    // Input (INP_xxx)
    InpInvalidArgument,

    // Configuration (CFG_xxx)
    CfgInvalid,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PreMissingContent => "PRE_001",
            ErrorCode::PreDecodeFailed => "PRE_002",
            ErrorCode::PreStepFailed => "PRE_003",
            ErrorCode::PatUnknown => "PAT_001",
            ErrorCode::ValViolations => "VAL_001",
            ErrorCode::StoWriteFailed => "STO_001",
            ErrorCode::StoReadFailed => "STO_002",
            ErrorCode::StoNotFound => "STO_003",
            ErrorCode::StoConnectionFailed => "STO_004",
            ErrorCode::CapEmbeddingFailed => "CAP_001",
            ErrorCode::CapDescriptionFailed => "CAP_002",
            ErrorCode::CapSummarizationFailed => "CAP_003",
            ErrorCode::CapConnectionFailed => "CAP_004",
            ErrorCode::InpInvalidArgument => "INP_001",
            ErrorCode::CfgInvalid => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl IndexError {
    /// Create a preprocessing error for a content key.
    pub fn preprocessing(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Preprocessing {
            key: key.into(),
            message: message.into(),
            code: ErrorCode::PreStepFailed,
            source: None,
        }
    }

    /// Create a preprocessing error for a required key that is absent or empty.
    pub fn missing_content(key: impl Into<String>, pattern: &str) -> Self {
        let key = key.into();
        Self::Preprocessing {
            message: format!("pattern '{}' requires '{}' content", pattern, key),
            key,
            code: ErrorCode::PreMissingContent,
            source: None,
        }
    }

    /// Create a preprocessing error wrapping an underlying cause.
    pub fn preprocessing_with_source(
        key: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Preprocessing {
            key: key.into(),
            message: message.into(),
            code: ErrorCode::PreDecodeFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create an unknown pattern error.
    pub fn unknown_pattern(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownPattern {
            name: name.into(),
            available,
        }
    }

    /// Create a validation error from a list of violations.
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self::Validation { violations }
    }

    /// Create a vector store error.
    pub fn vector_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            port: StoragePort::VectorStore,
            operation: operation.into(),
            message: message.into(),
            code: ErrorCode::StoWriteFailed,
            source: None,
        }
    }

    /// Create an object store error.
    pub fn object_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            port: StoragePort::ObjectStore,
            operation: operation.into(),
            message: message.into(),
            code: ErrorCode::StoWriteFailed,
            source: None,
        }
    }

    /// Create a storage error wrapping an underlying cause.
    pub fn storage_with_source(
        port: StoragePort,
        operation: impl Into<String>,
        code: ErrorCode,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            port,
            operation: operation.into(),
            message: source.to_string(),
            code,
            source: Some(Box::new(source)),
        }
    }

    /// Create a not found error for a storage port.
    pub fn not_found(port: StoragePort, id: impl Into<String>) -> Self {
        Self::Storage {
            port,
            operation: "get".to_string(),
            message: format!("'{}' not found", id.into()),
            code: ErrorCode::StoNotFound,
            source: None,
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Capability {
            capability: Capability::Embedding,
            message: message.into(),
            code: ErrorCode::CapEmbeddingFailed,
            source: None,
        }
    }

    /// Create a description error.
    pub fn description(message: impl Into<String>) -> Self {
        Self::Capability {
            capability: Capability::Description,
            message: message.into(),
            code: ErrorCode::CapDescriptionFailed,
            source: None,
        }
    }

    /// Create a summarization error.
    pub fn summarization(message: impl Into<String>) -> Self {
        Self::Capability {
            capability: Capability::Summarization,
            message: message.into(),
            code: ErrorCode::CapSummarizationFailed,
            source: None,
        }
    }

    /// Create a capability error wrapping an underlying cause.
    pub fn capability_with_source(
        capability: Capability,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Capability {
            capability,
            message: message.into(),
            code: ErrorCode::CapConnectionFailed,
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Preprocessing { code, .. } => *code,
            Self::UnknownPattern { .. } => ErrorCode::PatUnknown,
            Self::Validation { .. } => ErrorCode::ValViolations,
            Self::Storage { code, .. } => *code,
            Self::Capability { code, .. } => *code,
            Self::InvalidInput { .. } => ErrorCode::InpInvalidArgument,
            Self::Configuration(_) => ErrorCode::CfgInvalid,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Preprocessing { .. } => {
                Some("Check that the content bundle has the keys the pattern requires and that files are readable")
            }
            Self::UnknownPattern { .. } => {
                Some("Use one of the registered pattern names or register a custom pattern")
            }
            Self::Validation { .. } => Some(
                "Check the embedder dimension and the metadata size against the index configuration",
            ),
            Self::Storage { .. } => Some("Please check your storage backend connection settings"),
            Self::Capability { .. } => Some("Please check your model provider configuration"),
            Self::InvalidInput { .. } => Some("Please check your request parameters"),
            _ => None,
        }
    }

    /// The failing content key, when the error is tied to one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Preprocessing { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// A failure recorded for a single item inside a batch.
#[derive(Error, Debug)]
#[error("Item {index} failed under pattern '{pattern}': {error}")]
pub struct BatchItemError {
    /// Position of the item in the caller's input list.
    pub index: usize,
    /// Pattern the item was processed with.
    pub pattern: String,
    /// Underlying failure.
    #[source]
    pub error: IndexError,
}

impl BatchItemError {
    /// Wrap an item failure with its batch position.
    pub fn new(index: usize, pattern: impl Into<String>, error: IndexError) -> Self {
        Self {
            index,
            pattern: pattern.into(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_content_error() {
        let err = IndexError::missing_content("text", "text");
        assert_eq!(err.code(), ErrorCode::PreMissingContent);
        assert_eq!(err.key(), Some("text"));
        assert!(err.to_string().contains("'text'"));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_unknown_pattern_lists_available() {
        let err = IndexError::unknown_pattern("nope", vec!["hybrid".into(), "text".into()]);
        assert_eq!(err.code(), ErrorCode::PatUnknown);
        assert_eq!(
            err.to_string(),
            "Unknown pattern 'nope' (available: hybrid, text)"
        );
    }

    #[test]
    fn test_validation_error_reports_every_violation() {
        let err = IndexError::validation(vec![
            Violation::DimensionMismatch {
                expected: 4,
                actual: 3,
            },
            Violation::EmptyMetadataKey,
        ]);
        let message = err.to_string();
        assert!(message.contains("2 violation(s)"));
        assert!(message.contains("expected 4"));
        assert!(message.contains("empty"));
    }

    #[test]
    fn test_storage_error_names_port() {
        let err = IndexError::object_store("put", "bucket missing");
        assert!(err.to_string().starts_with("object_store error during put"));
        assert_eq!(err.code().as_str(), "STO_001");
    }

    #[test]
    fn test_batch_item_error_display() {
        let err = BatchItemError::new(1, "text", IndexError::missing_content("text", "text"));
        assert!(err.to_string().starts_with("Item 1 failed under pattern 'text'"));
        assert_eq!(err.error.code(), ErrorCode::PreMissingContent);
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::PatUnknown.as_str(), "PAT_001");
        assert_eq!(ErrorCode::InpInvalidArgument.as_str(), "INP_001");
    }
}
