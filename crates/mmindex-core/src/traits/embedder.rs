//! Embedder trait and related types.

use async_trait::async_trait;

use crate::error::IndexResult;

/// Content to embed. At least one modality should be present.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingInput<'a> {
    /// Text to embed.
    pub text: Option<&'a str>,
    /// Encoded image to embed.
    pub image: Option<&'a [u8]>,
}

impl<'a> EmbeddingInput<'a> {
    /// Text-only input.
    pub fn text(text: &'a str) -> Self {
        Self {
            text: Some(text),
            image: None,
        }
    }

    /// Image-only input.
    pub fn image(image: &'a [u8]) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }

    /// Joint text and image input.
    pub fn multimodal(text: &'a str, image: &'a [u8]) -> Self {
        Self {
            text: Some(text),
            image: Some(image),
        }
    }

    /// Whether neither modality is present.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none()
    }
}

/// Core Embedder trait - all embedding providers implement this.
///
/// Implementations must return vectors of exactly [`Embedder::dimension`]
/// values for every input they accept, whatever the modality mix.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for text, an image, or both jointly.
    async fn embed(&self, input: EmbeddingInput<'_>) -> IndexResult<Vec<f32>>;

    /// Generate an embedding for text only.
    async fn embed_text(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.embed(EmbeddingInput::text(text)).await
    }

    /// Get the dimension of the embeddings.
    fn dimension(&self) -> usize;

    /// Get the model name.
    fn model_name(&self) -> &str;

    /// Whether image input is accepted.
    fn supports_images(&self) -> bool {
        false
    }
}
