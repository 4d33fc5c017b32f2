//! Image description embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{
    optional_text, require_image, store_image, tag_pattern, PatternOutput, PatternStrategy,
};
use crate::error::{IndexError, IndexResult};
use crate::traits::{Embedder, ImageDescriber, ObjectStore};
use crate::types::{keys, ContentBundle, Metadata, IMAGE_KEY, TEXT_KEY};

/// Describes the image with a vision model and embeds the description.
///
/// The description is kept in metadata and the original image is stored
/// in the object store under `__img_ref`.
pub struct DescribePattern {
    embedder: Arc<dyn Embedder>,
    describer: Arc<dyn ImageDescriber>,
    object_store: Arc<dyn ObjectStore>,
}

impl DescribePattern {
    pub const NAME: &'static str = "describe";

    pub fn new(
        embedder: Arc<dyn Embedder>,
        describer: Arc<dyn ImageDescriber>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            embedder,
            describer,
            object_store,
        }
    }

    async fn describe(&self, image: &[u8]) -> IndexResult<String> {
        let description = self.describer.describe(image).await?;
        let description = description.trim();
        if description.is_empty() {
            return Err(IndexError::description(format!(
                "model '{}' returned an empty description",
                self.describer.model_name()
            )));
        }
        Ok(description.to_string())
    }
}

#[async_trait]
impl PatternStrategy for DescribePattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Generates an image description and embeds it"
    }

    fn required_keys(&self) -> &[&'static str] {
        &[IMAGE_KEY]
    }

    fn optional_keys(&self) -> &[&'static str] {
        &[TEXT_KEY]
    }

    async fn process(
        &self,
        doc_id: &str,
        content: &ContentBundle,
        mut metadata: Metadata,
    ) -> IndexResult<PatternOutput> {
        let image = require_image(content, Self::NAME).await?;
        let description = self.describe(&image).await?;
        tracing::debug!(
            "Generated description for {}: {} chars",
            doc_id,
            description.len()
        );

        let embedding = self.embedder.embed_text(&description).await?;

        let uri = store_image(self.object_store.as_ref(), doc_id, &image).await?;
        metadata.insert(keys::IMAGE_REF.to_string(), json!(uri));
        metadata.insert("image_bytes".to_string(), json!(image.len()));
        metadata.insert(
            "description_length".to_string(),
            json!(description.chars().count()),
        );
        metadata.insert("description".to_string(), json!(description));
        metadata.insert("processing_type".to_string(), json!("image_description"));

        if let Some(text) = optional_text(content).await? {
            metadata.insert("original_text_length".to_string(), json!(text.chars().count()));
            metadata.insert("original_text".to_string(), json!(text));
        }

        tag_pattern(&mut metadata, Self::NAME);
        Ok(PatternOutput::single(embedding, metadata))
    }

    /// Image queries are described first; text queries are embedded as-is
    /// to match against stored descriptions.
    async fn embed_query(&self, query: &ContentBundle) -> IndexResult<Vec<f32>> {
        if query.has(IMAGE_KEY) {
            let image = require_image(query, Self::NAME).await?;
            let description = self.describe(&image).await?;
            return self.embedder.embed_text(&description).await;
        }
        match optional_text(query).await? {
            Some(text) => self.embedder.embed_text(&text).await,
            None => Err(IndexError::missing_content(IMAGE_KEY, Self::NAME)),
        }
    }
}
