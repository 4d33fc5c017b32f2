//! Provider configuration.

use serde::{Deserialize, Serialize};

use mmindex_core::error::{IndexError, IndexResult};
use mmindex_core::traits::{DEFAULT_DESCRIBE_PROMPT, DEFAULT_SUMMARIZE_PROMPT};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderProvider {
    /// Offline feature hashing.
    #[default]
    Hashing,
    Ollama,
}

/// Text-generation provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Ollama,
}

/// Embedder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub provider: EmbedderProvider,
    /// Model name. Provider default when empty.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_dimension() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> usize {
    3
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::default(),
            model: String::new(),
            dimension: default_dimension(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl EmbedderConfig {
    /// Base URL, falling back to `OLLAMA_HOST` and then the local default.
    pub fn endpoint(&self) -> String {
        resolve_endpoint(self.base_url.as_deref())
    }
}

/// Describer / summarizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Vision-capable model name. Provider default when empty.
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_describe_prompt")]
    pub describe_prompt: String,
    #[serde(default = "default_summarize_prompt")]
    pub summarize_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_describe_prompt() -> String {
    DEFAULT_DESCRIBE_PROMPT.to_string()
}

fn default_summarize_prompt() -> String {
    DEFAULT_SUMMARIZE_PROMPT.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: String::new(),
            base_url: None,
            describe_prompt: default_describe_prompt(),
            summarize_prompt: default_summarize_prompt(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmConfig {
    /// Base URL, falling back to `OLLAMA_HOST` and then the local default.
    pub fn endpoint(&self) -> String {
        resolve_endpoint(self.base_url.as_deref())
    }
}

fn resolve_endpoint(base_url: Option<&str>) -> String {
    base_url
        .map(str::to_string)
        .or_else(|| std::env::var("OLLAMA_HOST").ok())
        .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
}

/// All providers used by one ingestor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub embedder: EmbedderConfig,
    /// Needed only by the describe and summarize patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmConfig>,
}

impl ProviderConfig {
    /// Load from `MMINDEX_EMBEDDER_*` and `MMINDEX_LLM_*` variables.
    pub fn from_env() -> IndexResult<Self> {
        let mut config = Self::default();

        if let Ok(provider) = std::env::var("MMINDEX_EMBEDDER") {
            config.embedder.provider = parse_provider(&provider)?;
        }
        if let Ok(model) = std::env::var("MMINDEX_EMBEDDER_MODEL") {
            config.embedder.model = model;
        }
        if let Ok(dimension) = std::env::var("MMINDEX_DIMENSION") {
            config.embedder.dimension = dimension.parse().map_err(|_| {
                IndexError::Configuration(format!(
                    "MMINDEX_DIMENSION is not a number: {}",
                    dimension
                ))
            })?;
        }
        if let Ok(url) = std::env::var("MMINDEX_EMBEDDER_URL") {
            config.embedder.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("MMINDEX_LLM_MODEL") {
            config.llm = Some(LlmConfig {
                model,
                base_url: std::env::var("MMINDEX_LLM_URL").ok(),
                ..Default::default()
            });
        }

        Ok(config)
    }
}

fn parse_provider(value: &str) -> IndexResult<EmbedderProvider> {
    match value.to_ascii_lowercase().as_str() {
        "hashing" => Ok(EmbedderProvider::Hashing),
        "ollama" => Ok(EmbedderProvider::Ollama),
        other => Err(IndexError::Configuration(format!(
            "unknown embedder provider '{}' (expected hashing or ollama)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ProviderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.embedder.provider, EmbedderProvider::Hashing);
        assert_eq!(config.embedder.dimension, 384);
        assert!(config.llm.is_none());

        let llm: LlmConfig = serde_json::from_str(r#"{"model": "llava"}"#).unwrap();
        assert_eq!(llm.describe_prompt, DEFAULT_DESCRIBE_PROMPT);
        assert_eq!(llm.max_retries, 3);
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let config = EmbedderConfig {
            base_url: Some("http://gpu-box:11434".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://gpu-box:11434");
    }

    #[test]
    fn test_parse_provider() {
        assert_eq!(parse_provider("Ollama").unwrap(), EmbedderProvider::Ollama);
        assert!(parse_provider("bedrock").is_err());
    }
}
