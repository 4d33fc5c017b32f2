//! Pattern strategies: how multimodal content becomes embeddings.
//!
//! Each [`PatternStrategy`] turns a normalized [`ContentBundle`] into one or
//! more embedding slots plus enriched metadata, and knows how to embed a
//! search query for documents it produced. Patterns are looked up by name
//! through a [`PatternEngine`] owned by one ingestor.

mod describe;
mod full_embedding;
mod hybrid;
mod registry;
mod summarize;
mod text;

pub use describe::DescribePattern;
pub use full_embedding::FullEmbeddingPattern;
pub use hybrid::HybridPattern;
pub use registry::{PatternDependencies, PatternEngine};
pub use summarize::SummarizePattern;
pub use text::TextPattern;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{IndexError, IndexResult};
use crate::preprocess::detect_image_format;
use crate::traits::ObjectStore;
use crate::types::{keys, ContentBundle, Metadata, IMAGE_KEY, TEXT_KEY};

/// Name of the slot every pattern must produce first.
pub const PRIMARY_SLOT: &str = "primary";

/// Number of characters kept in `text_preview`.
const PREVIEW_CHARS: usize = 100;

/// One named embedding produced by a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSlot {
    pub name: String,
    pub vector: Vec<f32>,
}

/// Embeddings and enriched metadata for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternOutput {
    /// Slots in order; the first is the primary slot.
    pub embeddings: Vec<EmbeddingSlot>,
    /// Caller metadata plus pattern enrichment.
    pub metadata: Metadata,
}

impl PatternOutput {
    /// Output with a single primary slot.
    pub fn single(vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            embeddings: vec![EmbeddingSlot {
                name: PRIMARY_SLOT.to_string(),
                vector,
            }],
            metadata,
        }
    }

    /// Add a secondary slot.
    pub fn with_slot(mut self, name: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.push(EmbeddingSlot {
            name: name.into(),
            vector,
        });
        self
    }

    /// The primary embedding.
    pub fn primary(&self) -> Option<&[f32]> {
        self.embeddings.first().map(|slot| slot.vector.as_slice())
    }
}

/// Static description of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternInfo {
    pub name: String,
    pub description: String,
    pub required_keys: Vec<String>,
    pub optional_keys: Vec<String>,
}

/// A named strategy turning content into embeddings plus metadata.
#[async_trait]
pub trait PatternStrategy: Send + Sync {
    /// Stable name used for lookup and recorded under the `pattern` metadata key.
    fn name(&self) -> &str;

    /// Human-readable summary.
    fn description(&self) -> &str;

    /// Keys that must be present and non-empty.
    fn required_keys(&self) -> &[&'static str];

    /// Keys used when present.
    fn optional_keys(&self) -> &[&'static str] {
        &[]
    }

    /// Check required keys before any expensive work.
    fn validate_content(&self, content: &ContentBundle) -> IndexResult<()> {
        for key in self.required_keys() {
            if !content.has(key) {
                return Err(IndexError::missing_content(*key, self.name()));
            }
        }
        Ok(())
    }

    /// Produce embeddings and enriched metadata for one document.
    async fn process(
        &self,
        doc_id: &str,
        content: &ContentBundle,
        metadata: Metadata,
    ) -> IndexResult<PatternOutput>;

    /// Embed a search query against documents this pattern produced.
    async fn embed_query(&self, query: &ContentBundle) -> IndexResult<Vec<f32>>;

    /// Describe the pattern.
    fn info(&self) -> PatternInfo {
        PatternInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            required_keys: self.required_keys().iter().map(|k| k.to_string()).collect(),
            optional_keys: self.optional_keys().iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Read the text entry, failing when it is absent or blank.
pub(crate) async fn require_text(content: &ContentBundle, pattern: &str) -> IndexResult<String> {
    let payload = content
        .get(TEXT_KEY)
        .ok_or_else(|| IndexError::missing_content(TEXT_KEY, pattern))?;
    let text = payload.load_text(TEXT_KEY).await?;
    if text.trim().is_empty() {
        return Err(IndexError::missing_content(TEXT_KEY, pattern));
    }
    Ok(text)
}

/// Read the text entry when present and non-blank.
pub(crate) async fn optional_text(content: &ContentBundle) -> IndexResult<Option<String>> {
    match content.get(TEXT_KEY) {
        Some(payload) if !payload.is_empty() => {
            let text = payload.load_text(TEXT_KEY).await?;
            Ok((!text.trim().is_empty()).then_some(text))
        }
        _ => Ok(None),
    }
}

/// Read the image entry as encoded bytes when present.
pub(crate) async fn optional_image(content: &ContentBundle) -> IndexResult<Option<Vec<u8>>> {
    match content.get(IMAGE_KEY) {
        Some(payload) if !payload.is_empty() => {
            if payload.as_text().is_some() {
                return Err(IndexError::preprocessing(
                    IMAGE_KEY,
                    "expected image bytes or a file path, got text",
                ));
            }
            payload.load_bytes(IMAGE_KEY).await.map(Some)
        }
        _ => Ok(None),
    }
}

/// Read the image entry, failing when it is absent.
pub(crate) async fn require_image(content: &ContentBundle, pattern: &str) -> IndexResult<Vec<u8>> {
    optional_image(content)
        .await?
        .ok_or_else(|| IndexError::missing_content(IMAGE_KEY, pattern))
}

/// First `PREVIEW_CHARS` characters, with an ellipsis when cut.
pub(crate) fn text_preview(text: &str) -> String {
    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Add length, word count and preview of `text`.
pub(crate) fn add_text_stats(metadata: &mut Metadata, text: &str) {
    metadata.insert("text_length".to_string(), json!(text.chars().count()));
    metadata.insert(
        "text_word_count".to_string(),
        json!(text.split_whitespace().count()),
    );
    metadata.insert("text_preview".to_string(), json!(text_preview(text)));
}

/// Tag metadata with the producing pattern.
pub(crate) fn tag_pattern(metadata: &mut Metadata, pattern: &str) {
    metadata.insert(keys::PATTERN.to_string(), json!(pattern));
}

/// Store an image under `images/{doc_id}.{ext}` and return its URI.
pub(crate) async fn store_image(
    object_store: &dyn ObjectStore,
    doc_id: &str,
    image: &[u8],
) -> IndexResult<String> {
    let (extension, content_type) = match detect_image_format(image) {
        Some(info) => (info.extension, info.mime_type),
        None => ("bin", "application/octet-stream"),
    };
    let key = format!("images/{}.{}", doc_id, extension);
    let uri = object_store.put(&key, image.to_vec(), content_type).await?;
    tracing::debug!("Stored image: {} -> {}", key, uri);
    Ok(uri)
}

/// Store a text under `original_texts/{doc_id}.txt` and return its URI.
pub(crate) async fn store_text(
    object_store: &dyn ObjectStore,
    doc_id: &str,
    text: &str,
) -> IndexResult<String> {
    let key = format!("original_texts/{}.txt", doc_id);
    let uri = object_store
        .put(&key, text.as_bytes().to_vec(), "text/plain; charset=utf-8")
        .await?;
    tracing::debug!("Stored original text: {} -> {}", key, uri);
    Ok(uri)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("short"), "short");
        let long = "a".repeat(150);
        let preview = text_preview(&long);
        assert_eq!(preview.len(), 103);
        assert!(preview.ends_with("..."));
        assert_eq!(text_preview(&"é".repeat(100)), "é".repeat(100));
    }

    #[test]
    fn test_text_stats() {
        let mut m = Metadata::new();
        add_text_stats(&mut m, "2019 Honda Civic");
        assert_eq!(m["text_length"], 16);
        assert_eq!(m["text_word_count"], 3);
        assert_eq!(m["text_preview"], "2019 Honda Civic");
    }

    #[test]
    fn test_pattern_output_primary_slot() {
        let out = PatternOutput::single(vec![1.0], Metadata::new()).with_slot("image", vec![2.0]);
        assert_eq!(out.primary(), Some(&[1.0f32][..]));
        assert_eq!(out.embeddings[0].name, PRIMARY_SLOT);
        assert_eq!(out.embeddings[1].name, "image");
    }
}
