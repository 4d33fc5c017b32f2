//! mmindex-providers - Capability providers for mmindex.
//!
//! # Supported Providers
//!
//! - **Hashing** - offline, deterministic feature-hashing embedder for text and images
//! - **Ollama** (feature: `ollama`) - `/api/embed` embeddings plus image
//!   descriptions and summaries through `/api/generate`
//!
//! # Example
//!
//! ```ignore
//! use mmindex_providers::{LlmConfig, ProviderFactory};
//!
//! let embedder = ProviderFactory::ollama_with_model("nomic-embed-text", 768)?;
//! let describer = ProviderFactory::describer(&LlmConfig::default())?;
//!
//! let ingestor = MmIngestor::builder()
//!     .embedder(embedder)
//!     .describer(describer)
//!     // ...
//!     .build()
//!     .await?;
//! ```

mod config;
mod factory;
mod hashing;
#[cfg(feature = "ollama")]
mod ollama;

pub use config::{
    EmbedderConfig, EmbedderProvider, LlmConfig, LlmProvider, ProviderConfig, DEFAULT_OLLAMA_URL,
};
pub use factory::ProviderFactory;
pub use hashing::HashingEmbedder;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbedder, OllamaLlm};

// Re-export core traits for convenience
pub use mmindex_core::traits::{Embedder, EmbeddingInput, ImageDescriber, TextSummarizer};
