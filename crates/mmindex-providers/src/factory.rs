//! Factory for creating capability providers.

use std::sync::Arc;

use mmindex_core::error::IndexResult;
use mmindex_core::traits::{Embedder, ImageDescriber, TextSummarizer};

use crate::config::{EmbedderConfig, EmbedderProvider, LlmConfig, LlmProvider};
use crate::hashing::HashingEmbedder;

#[cfg(feature = "ollama")]
use crate::ollama::{OllamaEmbedder, OllamaLlm};

/// Factory for creating embedding, description and summarization providers.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create an embedder from the given configuration.
    pub fn embedder(config: &EmbedderConfig) -> IndexResult<Arc<dyn Embedder>> {
        match config.provider {
            EmbedderProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
            #[cfg(feature = "ollama")]
            EmbedderProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(config.clone())?)),
            #[cfg(not(feature = "ollama"))]
            EmbedderProvider::Ollama => Err(feature_disabled()),
        }
    }

    /// Create an image describer from the given configuration.
    pub fn describer(config: &LlmConfig) -> IndexResult<Arc<dyn ImageDescriber>> {
        match config.provider {
            #[cfg(feature = "ollama")]
            LlmProvider::Ollama => Ok(Arc::new(OllamaLlm::new(config.clone())?)),
            #[cfg(not(feature = "ollama"))]
            LlmProvider::Ollama => Err(feature_disabled()),
        }
    }

    /// Create a text summarizer from the given configuration.
    pub fn summarizer(config: &LlmConfig) -> IndexResult<Arc<dyn TextSummarizer>> {
        match config.provider {
            #[cfg(feature = "ollama")]
            LlmProvider::Ollama => Ok(Arc::new(OllamaLlm::new(config.clone())?)),
            #[cfg(not(feature = "ollama"))]
            LlmProvider::Ollama => Err(feature_disabled()),
        }
    }

    /// Create an offline hashing embedder.
    pub fn hashing(dimension: usize) -> IndexResult<Arc<dyn Embedder>> {
        Self::embedder(&EmbedderConfig {
            provider: EmbedderProvider::Hashing,
            dimension,
            ..Default::default()
        })
    }

    /// Create an Ollama embedder with a specific model.
    pub fn ollama_with_model(
        model: impl Into<String>,
        dimension: usize,
    ) -> IndexResult<Arc<dyn Embedder>> {
        Self::embedder(&EmbedderConfig {
            provider: EmbedderProvider::Ollama,
            model: model.into(),
            dimension,
            ..Default::default()
        })
    }
}

#[cfg(not(feature = "ollama"))]
fn feature_disabled() -> mmindex_core::error::IndexError {
    mmindex_core::error::IndexError::Configuration(
        "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmindex_core::error::IndexError;

    #[tokio::test]
    async fn test_hashing_embedder() {
        let embedder = ProviderFactory::hashing(24).unwrap();
        assert_eq!(embedder.dimension(), 24);
        assert!(embedder.supports_images());
        assert_eq!(embedder.embed_text("hello").await.unwrap().len(), 24);
    }

    #[test]
    fn test_zero_dimension_is_configuration_error() {
        let err = ProviderFactory::hashing(0).err().unwrap();
        assert!(matches!(err, IndexError::Configuration(_)));
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_ollama_providers() {
        let embedder = ProviderFactory::ollama_with_model("mxbai-embed-large", 1024).unwrap();
        assert_eq!(embedder.model_name(), "mxbai-embed-large");
        assert_eq!(embedder.dimension(), 1024);
        assert!(!embedder.supports_images());

        let config = LlmConfig {
            model: "llava:13b".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            ..Default::default()
        };
        assert_eq!(ProviderFactory::describer(&config).unwrap().model_name(), "llava:13b");
        assert_eq!(ProviderFactory::summarizer(&config).unwrap().model_name(), "llava:13b");
    }
}
