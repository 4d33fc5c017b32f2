//! Text-only embeddings.

use std::sync::Arc;

use async_trait::async_trait;

use super::{add_text_stats, require_text, tag_pattern, PatternOutput, PatternStrategy};
use crate::error::IndexResult;
use crate::traits::Embedder;
use crate::types::{ContentBundle, Metadata, TEXT_KEY};

/// Embeds the `text` entry directly. No object storage side effects.
pub struct TextPattern {
    embedder: Arc<dyn Embedder>,
}

impl TextPattern {
    pub const NAME: &'static str = "text";

    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl PatternStrategy for TextPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Embeds text content directly"
    }

    fn required_keys(&self) -> &[&'static str] {
        &[TEXT_KEY]
    }

    async fn process(
        &self,
        _doc_id: &str,
        content: &ContentBundle,
        mut metadata: Metadata,
    ) -> IndexResult<PatternOutput> {
        let text = require_text(content, Self::NAME).await?;
        let embedding = self.embedder.embed_text(&text).await?;

        add_text_stats(&mut metadata, &text);
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

    fn pattern() -> TextPattern {
        TextPattern::new(Arc::new(StubEmbedder { dimension: 4 }))
    }

    #[tokio::test]
    async fn test_text_pattern_embeds_and_tags() {
        let mut metadata = Metadata::new();
        metadata.insert("make".into(), "Honda".into());

        let out = pattern()
            .process("doc-1", &ContentBundle::text("red sedan"), metadata)
            .await
            .unwrap();

        assert_eq!(out.embeddings.len(), 1);
        assert_eq!(out.primary(), Some(&[9.0, 2.0, 0.0, 0.0][..]));
        assert_eq!(out.metadata["pattern"], "text");
        assert_eq!(out.metadata["make"], "Honda");
        assert_eq!(out.metadata["text_word_count"], 2);
    }

    #[tokio::test]
    async fn test_missing_text_names_key() {
        let err = pattern()
            .process("doc-1", &ContentBundle::image(vec![1, 2, 3]), Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.key(), Some(TEXT_KEY));
    }

    #[test]
    fn test_validate_content() {
        assert!(pattern().validate_content(&ContentBundle::text("ok")).is_ok());
        assert!(pattern().validate_content(&ContentBundle::new()).is_err());
    }
}
