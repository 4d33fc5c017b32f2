//! Text embeddings with the image kept in object storage.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{
    add_text_stats, optional_image, require_text, store_image, tag_pattern, PatternOutput,
    PatternStrategy,
};
use crate::error::IndexResult;
use crate::traits::{Embedder, ObjectStore};
use crate::types::{keys, ContentBundle, Metadata, IMAGE_KEY, TEXT_KEY};

/// Embeds the `text` entry; an optional image is uploaded to the object
/// store and referenced under `__img_ref` instead of being embedded.
pub struct HybridPattern {
    embedder: Arc<dyn Embedder>,
    object_store: Arc<dyn ObjectStore>,
}

impl HybridPattern {
    pub const NAME: &'static str = "hybrid";

    pub fn new(embedder: Arc<dyn Embedder>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            embedder,
            object_store,
        }
    }
}

#[async_trait]
impl PatternStrategy for HybridPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Embeds text and stores the image in object storage by reference"
    }

    fn required_keys(&self) -> &[&'static str] {
        &[TEXT_KEY]
    }

    fn optional_keys(&self) -> &[&'static str] {
        &[IMAGE_KEY]
    }

    async fn process(
        &self,
        doc_id: &str,
        content: &ContentBundle,
        mut metadata: Metadata,
    ) -> IndexResult<PatternOutput> {
        let text = require_text(content, Self::NAME).await?;
        let image = optional_image(content).await?;

        let embedding = self.embedder.embed_text(&text).await?;

        add_text_stats(&mut metadata, &text);
        metadata.insert("embedding_dimension".to_string(), json!(embedding.len()));
        metadata.insert("has_image".to_string(), json!(image.is_some()));

        if let Some(image) = image {
            let uri = store_image(self.object_store.as_ref(), doc_id, &image).await?;
            metadata.insert(keys::IMAGE_REF.to_string(), json!(uri));
            metadata.insert("image_bytes".to_string(), json!(image.len()));
        }

        tag_pattern(&mut metadata, Self::NAME);
        Ok(PatternOutput::single(embedding, metadata))
    }

    async fn embed_query(&self, query: &ContentBundle) -> IndexResult<Vec<f32>> {
        let text = require_text(query, Self::NAME).await?;
        self.embedder.embed_text(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_support::StubEmbedder;
    use crate::store::InMemoryObjectStore;

    #[tokio::test]
    async fn test_hybrid_stores_image_by_reference() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let embedder = Arc::new(StubEmbedder { dimension: 4 });
        let pattern = HybridPattern::new(embedder.clone(), objects.clone());

        let image = b"GIF89a-not-really-a-gif".to_vec();
        let content = ContentBundle::text("blue truck").with_image_bytes(image.clone());
        let out = pattern.process("doc-7", &content, Metadata::new()).await.unwrap();

        // Only the text contributes to the vector.
        let text_only = embedder.embed_text("blue truck").await.unwrap();
        assert_eq!(out.primary(), Some(text_only.as_slice()));

        let uri = out.metadata[keys::IMAGE_REF].as_str().unwrap();
        assert!(uri.ends_with("images/doc-7.gif"));
        assert_eq!(objects.get(uri).await.unwrap(), image);
        assert_eq!(out.metadata["has_image"], true);
        assert_eq!(out.metadata["pattern"], "hybrid");
    }

    #[tokio::test]
    async fn test_hybrid_without_image_has_no_reference() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let pattern = HybridPattern::new(Arc::new(StubEmbedder { dimension: 4 }), objects.clone());

        let out = pattern
            .process("doc-8", &ContentBundle::text("no picture"), Metadata::new())
            .await
            .unwrap();
        assert!(!out.metadata.contains_key(keys::IMAGE_REF));
        assert_eq!(out.metadata["has_image"], false);
        assert!(objects.is_empty());
    }
}
