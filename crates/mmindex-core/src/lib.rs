//! mmindex-core - Core library for mmindex.
//!
//! This crate provides the types, port traits, preprocessors, pattern
//! strategies, validation, audit logging, batch processing and the
//! [`MmIngestor`] facade of the multimodal ingestion and indexing engine.
//!
//! # Example
//!
//! ```ignore
//! use mmindex_core::{ContentBundle, IndexConfig, Metadata, MmIngestor};
//!
//! let ingestor = MmIngestor::builder()
//!     .config(IndexConfig::default())
//!     .vector_store(vector_store)
//!     .object_store(object_store)
//!     .embedder(embedder)
//!     .build()
//!     .await?;
//!
//! // Ingest text with an image kept in the object store
//! let bundle = ContentBundle::text("2019 Honda Civic, red").with_image_bytes(png);
//! let id = ingestor.ingest(bundle, Metadata::new(), "hybrid").await?;
//!
//! // Search
//! let hits = ingestor.search(ContentBundle::text("red sedan"), None, 5).await?;
//! ```

pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod ingestor;
pub mod patterns;
pub mod preprocess;
pub mod store;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use audit::{AuditLogger, AuditRecord, AuditSink, OperationKind};
pub use batch::{BatchProcessor, ItemProcessor};
pub use config::{ImageResizeConfig, IndexConfig, MetadataLimits};
pub use error::{BatchItemError, ErrorCode, IndexError, IndexResult};
pub use ingestor::{MmIngestor, MmIngestorBuilder};
pub use patterns::{PatternDependencies, PatternEngine, PatternOutput, PatternStrategy};
pub use preprocess::{ImageResizer, Preprocessor, PreprocessorChain};
pub use traits::{
    DistanceMetric, Embedder, EmbeddingInput, ImageDescriber, ObjectStore, TextSummarizer,
    VectorStore,
};
pub use types::{
    BatchItemOutcome, BatchResult, ContentBundle, IngestRequest, Metadata, MetadataFilter,
    Payload, SearchResult, VectorMatch, VectorRecord,
};
pub use validation::{Validator, Violation};
