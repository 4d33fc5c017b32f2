//! Summary embeddings for long texts.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{require_text, store_text, tag_pattern, PatternOutput, PatternStrategy};
use crate::error::{IndexError, IndexResult};
use crate::traits::{Embedder, ObjectStore, TextSummarizer};
use crate::types::{keys, ContentBundle, Metadata, TEXT_KEY};

/// Summarizes long text, embeds the summary and keeps the original text in
/// the object store under `__text_ref`.
pub struct SummarizePattern {
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn TextSummarizer>,
    object_store: Arc<dyn ObjectStore>,
    min_text_length: usize,
}

impl SummarizePattern {
    pub const NAME: &'static str = "summarize";

    pub fn new(
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn TextSummarizer>,
        object_store: Arc<dyn ObjectStore>,
        min_text_length: usize,
    ) -> Self {
        Self {
            embedder,
            summarizer,
            object_store,
            min_text_length,
        }
    }

    /// Minimum text length, in characters, this pattern accepts.
    pub fn min_text_length(&self) -> usize {
        self.min_text_length
    }
}

#[async_trait]
impl PatternStrategy for SummarizePattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Summarizes long text and embeds the summary"
    }

    fn required_keys(&self) -> &[&'static str] {
        &[TEXT_KEY]
    }

    async fn process(
        &self,
        doc_id: &str,
        content: &ContentBundle,
        mut metadata: Metadata,
    ) -> IndexResult<PatternOutput> {
        let text = require_text(content, Self::NAME).await?;
        let text_length = text.chars().count();
        if text_length < self.min_text_length {
            return Err(IndexError::preprocessing(
                TEXT_KEY,
                format!(
                    "text is {} characters, pattern '{}' needs at least {}",
                    text_length,
                    Self::NAME,
                    self.min_text_length
                ),
            ));
        }

        let summary = self.summarizer.summarize(&text).await?;
        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(IndexError::summarization(format!(
                "model '{}' returned an empty summary",
                self.summarizer.model_name()
            )));
        }
        let summary_length = summary.chars().count();
        tracing::debug!(
            "Summarized {}: {} -> {} chars",
            doc_id,
            text_length,
            summary_length
        );

        let embedding = self.embedder.embed_text(&summary).await?;
        let uri = store_text(self.object_store.as_ref(), doc_id, &text).await?;

        let ratio = (summary_length as f64 / text_length as f64 * 1000.0).round() / 1000.0;
        metadata.insert("summary".to_string(), json!(summary));
        metadata.insert("summary_length".to_string(), json!(summary_length));
        metadata.insert("original_text_length".to_string(), json!(text_length));
        metadata.insert("compression_ratio".to_string(), json!(ratio));
        metadata.insert("processing_type".to_string(), json!("text_summarization"));
        metadata.insert(keys::TEXT_REF.to_string(), json!(uri));

        tag_pattern(&mut metadata, Self::NAME);
        Ok(PatternOutput::single(embedding, metadata))
    }

    /// Queries are short; they are embedded without summarization.
    async fn embed_query(&self, query: &ContentBundle) -> IndexResult<Vec<f32>> {
        let text = require_text(query, Self::NAME).await?;
        self.embedder.embed_text(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_support::{StubEmbedder, StubSummarizer};
    use crate::store::InMemoryObjectStore;

    fn pattern(objects: Arc<InMemoryObjectStore>, min: usize) -> SummarizePattern {
        SummarizePattern::new(
            Arc::new(StubEmbedder { dimension: 4 }),
            Arc::new(StubSummarizer),
            objects,
            min,
        )
    }

    #[tokio::test]
    async fn test_summarize_long_text() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let text = "word ".repeat(40);
        let out = pattern(objects.clone(), 100)
            .process("doc-s", &ContentBundle::text(text.clone()), Metadata::new())
            .await
            .unwrap();

        assert_eq!(out.metadata["summary_length"], 49);
        assert_eq!(out.metadata["original_text_length"], 200);
        assert_eq!(out.metadata["compression_ratio"], 0.245);
        assert_eq!(out.metadata["pattern"], "summarize");

        let uri = out.metadata[keys::TEXT_REF].as_str().unwrap();
        assert!(uri.ends_with("original_texts/doc-s.txt"));
        assert_eq!(objects.get(uri).await.unwrap(), text.into_bytes());
    }

    #[tokio::test]
    async fn test_short_text_is_rejected() {
        let err = pattern(Arc::new(InMemoryObjectStore::new()), 1000)
            .process("doc-s", &ContentBundle::text("too short"), Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.key(), Some(TEXT_KEY));
        assert!(err.to_string().contains("at least 1000"));
    }
}
