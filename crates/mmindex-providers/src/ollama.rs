//! Ollama HTTP providers.
//!
//! [`OllamaEmbedder`] calls `/api/embed`; [`OllamaLlm`] calls
//! `/api/generate` with base64-encoded images for descriptions and a
//! plain prompt for summaries. Connection failures, 429 and 5xx responses
//! are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use mmindex_core::error::{Capability, IndexError, IndexResult};
use mmindex_core::traits::{Embedder, EmbeddingInput, ImageDescriber, TextSummarizer};

use crate::config::{EmbedderConfig, LlmConfig};

const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_VISION_MODEL: &str = "llava";

#[derive(Debug)]
enum RequestError {
    /// Worth retrying.
    Transient(String),
    Permanent(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Transient(msg) | RequestError::Permanent(msg) => f.write_str(msg),
        }
    }
}

/// Minimal JSON client shared by both providers.
#[derive(Clone)]
struct OllamaClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

impl OllamaClient {
    fn new(base_url: &str, timeout_secs: u64, max_retries: usize) -> IndexResult<Self> {
        let url = url::Url::parse(base_url)
            .map_err(|e| IndexError::Configuration(format!("Invalid Ollama URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IndexError::Configuration(format!(
                "Ollama URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                IndexError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    async fn post_once<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RequestError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| RequestError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RequestError::Transient(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaError>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            let message = format!("Ollama API error ({}): {}", status, message);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                RequestError::Transient(message)
            } else {
                RequestError::Permanent(message)
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| RequestError::Permanent(format!("failed to parse response: {}", e)))
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RequestError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        (|| self.post_once(path, body))
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(self.max_retries)
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_delay(Duration::from_secs(5)),
            )
            .when(|e| matches!(e, RequestError::Transient(_)))
            .notify(|err, dur| {
                tracing::warn!(
                    "Ollama request to {}{} failed, retrying in {:?}: {}",
                    self.base_url,
                    path,
                    dur,
                    err
                );
            })
            .await
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama text embedding provider.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder.
    pub fn new(config: EmbedderConfig) -> IndexResult<Self> {
        let client =
            OllamaClient::new(&config.endpoint(), config.timeout_secs, config.max_retries)?;
        let model = if config.model.is_empty() {
            DEFAULT_EMBED_MODEL.to_string()
        } else {
            config.model
        };

        Ok(Self {
            client,
            model,
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, input: EmbeddingInput<'_>) -> IndexResult<Vec<f32>> {
        let text = match (input.text, input.image) {
            (_, Some(_)) => {
                return Err(IndexError::embedding(format!(
                    "Ollama model '{}' does not accept image input",
                    self.model
                )))
            }
            (Some(text), None) => text,
            (None, None) => return Err(IndexError::embedding("nothing to embed")),
        };

        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let response: EmbedResponse = self
            .client
            .post("/api/embed", &request)
            .await
            .map_err(|e| IndexError::embedding(format!("Ollama embedding error: {}", e)))?;

        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::embedding("Ollama returned no embeddings"))?;

        if embedding.len() != self.dimension {
            return Err(IndexError::embedding(format!(
                "model '{}' returned {} values, configured dimension is {}",
                self.model,
                embedding.len(),
                self.dimension
            )));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama vision / text model used for image descriptions and summaries.
pub struct OllamaLlm {
    client: OllamaClient,
    config: LlmConfig,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider.
    pub fn new(config: LlmConfig) -> IndexResult<Self> {
        let client =
            OllamaClient::new(&config.endpoint(), config.timeout_secs, config.max_retries)?;

        let mut config = config;
        if config.model.is_empty() {
            config.model = DEFAULT_VISION_MODEL.to_string();
        }

        Ok(Self { client, config })
    }

    async fn generate(
        &self,
        prompt: String,
        images: Vec<String>,
        capability: Capability,
    ) -> IndexResult<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            images,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let failed = |message: String| match capability {
            Capability::Description => IndexError::description(message),
            _ => IndexError::summarization(message),
        };

        let response: GenerateResponse = self
            .client
            .post("/api/generate", &request)
            .await
            .map_err(|e| failed(format!("Ollama generation error: {}", e)))?;

        let text = response.response.trim().to_string();
        if text.is_empty() {
            return Err(failed(format!("model '{}' returned an empty response", self.config.model)));
        }
        Ok(text)
    }
}

#[async_trait]
impl ImageDescriber for OllamaLlm {
    async fn describe(&self, image: &[u8]) -> IndexResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate(
            self.config.describe_prompt.clone(),
            vec![encoded],
            Capability::Description,
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextSummarizer for OllamaLlm {
    async fn summarize(&self, text: &str) -> IndexResult<String> {
        let prompt = format!("{}\n\n{}", self.config.summarize_prompt, text);
        self.generate(prompt, Vec::new(), Capability::Summarization)
            .await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        let config = EmbedderConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(OllamaEmbedder::new(config).is_err());

        let config = LlmConfig {
            base_url: Some("ftp://localhost:11434".to_string()),
            ..Default::default()
        };
        assert!(OllamaLlm::new(config).is_err());
    }

    #[test]
    fn test_default_models() {
        let embedder = OllamaEmbedder::new(EmbedderConfig {
            base_url: Some("http://localhost:11434".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(embedder.model_name(), DEFAULT_EMBED_MODEL);

        let llm = OllamaLlm::new(LlmConfig {
            base_url: Some("http://localhost:11434/".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ImageDescriber::model_name(&llm), DEFAULT_VISION_MODEL);
        assert_eq!(llm.client.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_image_input_rejected_without_request() {
        let embedder = OllamaEmbedder::new(EmbedderConfig {
            base_url: Some("http://127.0.0.1:9".to_string()),
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();
        let err = embedder
            .embed(EmbeddingInput::image(&[1, 2, 3]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not accept image input"));
    }
}
