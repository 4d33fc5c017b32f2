//! Unified multimodal embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{
    add_text_stats, optional_image, optional_text, tag_pattern, PatternOutput, PatternStrategy,
};
use crate::error::{IndexError, IndexResult};
use crate::traits::{Embedder, EmbeddingInput};
use crate::types::{ContentBundle, Metadata, IMAGE_KEY, TEXT_KEY};

/// Embeds text and image jointly into one vector.
///
/// With only one modality present the embedder is called with that
/// modality alone; the vector keeps the configured dimension.
pub struct FullEmbeddingPattern {
    embedder: Arc<dyn Embedder>,
}

impl FullEmbeddingPattern {
    pub const NAME: &'static str = "full_embedding";

    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    async fn embed(&self, text: Option<&str>, image: Option<&[u8]>) -> IndexResult<Vec<f32>> {
        if image.is_some() && !self.embedder.supports_images() {
            return Err(IndexError::embedding(format!(
                "embedder '{}' does not accept images",
                self.embedder.model_name()
            )));
        }
        self.embedder.embed(EmbeddingInput { text, image }).await
    }

    async fn read(
        &self,
        content: &ContentBundle,
    ) -> IndexResult<(Option<String>, Option<Vec<u8>>)> {
        let text = optional_text(content).await?;
        let image = optional_image(content).await?;
        if text.is_none() && image.is_none() {
            return Err(IndexError::preprocessing(
                format!("{}|{}", TEXT_KEY, IMAGE_KEY),
                format!("pattern '{}' requires text or image content", Self::NAME),
            ));
        }
        Ok((text, image))
    }
}

#[async_trait]
impl PatternStrategy for FullEmbeddingPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Embeds text and image together with a multimodal model"
    }

    fn required_keys(&self) -> &[&'static str] {
        &[]
    }

    fn optional_keys(&self) -> &[&'static str] {
        &[TEXT_KEY, IMAGE_KEY]
    }

    fn validate_content(&self, content: &ContentBundle) -> IndexResult<()> {
        if content.has(TEXT_KEY) || content.has(IMAGE_KEY) {
            Ok(())
        } else {
            Err(IndexError::preprocessing(
                format!("{}|{}", TEXT_KEY, IMAGE_KEY),
                format!("pattern '{}' requires text or image content", Self::NAME),
            ))
        }
    }

    async fn process(
        &self,
        _doc_id: &str,
        content: &ContentBundle,
        mut metadata: Metadata,
    ) -> IndexResult<PatternOutput> {
        let (text, image) = self.read(content).await?;
        let embedding = self.embed(text.as_deref(), image.as_deref()).await?;

        metadata.insert("has_text".to_string(), json!(text.is_some()));
        metadata.insert("has_image".to_string(), json!(image.is_some()));
        metadata.insert(
            "multimodal".to_string(),
            json!(text.is_some() && image.is_some()),
        );
        if let Some(text) = &text {
            add_text_stats(&mut metadata, text);
        }
        if let Some(image) = &image {
            metadata.insert("image_bytes".to_string(), json!(image.len()));
        }

        tag_pattern(&mut metadata, Self::NAME);
        Ok(PatternOutput::single(embedding, metadata))
    }

    async fn embed_query(&self, query: &ContentBundle) -> IndexResult<Vec<f32>> {
        let (text, image) = self.read(query).await?;
        self.embed(text.as_deref(), image.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_support::StubEmbedder;

    fn pattern() -> FullEmbeddingPattern {
        FullEmbeddingPattern::new(Arc::new(StubEmbedder { dimension: 4 }))
    }

    #[tokio::test]
    async fn test_joint_embedding() {
        let content = ContentBundle::text("red car").with_image_bytes(vec![0; 10]);
        let out = pattern().process("d", &content, Metadata::new()).await.unwrap();
        assert_eq!(out.primary(), Some(&[7.0, 2.0, 10.0, 0.0][..]));
        assert_eq!(out.metadata["multimodal"], true);
        assert_eq!(out.metadata["image_bytes"], 10);
        assert_eq!(out.metadata["pattern"], "full_embedding");
    }

    #[tokio::test]
    async fn test_single_modality_keeps_dimension() {
        let text_only = pattern()
            .process("d", &ContentBundle::text("red car"), Metadata::new())
            .await
            .unwrap();
        let image_only = pattern()
            .process("d", &ContentBundle::image(vec![0; 3]), Metadata::new())
            .await
            .unwrap();

        assert_eq!(text_only.primary().map(<[f32]>::len), Some(4));
        assert_eq!(image_only.primary().map(<[f32]>::len), Some(4));
        assert_eq!(text_only.metadata["multimodal"], false);
        assert_eq!(image_only.metadata["has_text"], false);
    }

    #[tokio::test]
    async fn test_empty_bundle_is_rejected() {
        let err = pattern()
            .process("d", &ContentBundle::new(), Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Preprocessing { .. }));
        assert!(pattern().validate_content(&ContentBundle::new()).is_err());
    }
}
