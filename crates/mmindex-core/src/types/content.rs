//! Content bundles handed to the ingestor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{IndexError, IndexResult};

/// Bundle key for text content.
pub const TEXT_KEY: &str = "text";
/// Bundle key for image content.
pub const IMAGE_KEY: &str = "image";

/// A raw content payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Payload {
    /// Inline string content.
    Text(String),
    /// A file on local disk, read lazily.
    Path(PathBuf),
    /// Raw bytes (encoded image, audio, ...).
    Bytes(Vec<u8>),
}

impl Payload {
    /// Inline text, if this payload is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes, if this payload is a byte buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Whether the payload carries nothing usable.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(text) => text.trim().is_empty(),
            Payload::Path(path) => path.as_os_str().is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Resolve the payload to bytes, reading from disk for `Path`.
    pub async fn load_bytes(&self, key: &str) -> IndexResult<Vec<u8>> {
        match self {
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                IndexError::preprocessing_with_source(
                    key,
                    format!("failed to read {}", path.display()),
                    e,
                )
            }),
        }
    }

    /// Resolve the payload to a UTF-8 string, reading from disk for `Path`.
    pub async fn load_text(&self, key: &str) -> IndexResult<String> {
        match self {
            Payload::Text(text) => Ok(text.clone()),
            Payload::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|e| {
                IndexError::preprocessing_with_source(key, "content is not valid UTF-8", e)
            }),
            Payload::Path(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                IndexError::preprocessing_with_source(
                    key,
                    format!("failed to read {}", path.display()),
                    e,
                )
            }),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::Path(path)
    }
}

/// Multimodal content keyed by media kind (`text`, `image`, ...).
///
/// Which keys must be present depends on the pattern the bundle is
/// ingested with. Preprocessors may rewrite entries but never drop keys
/// they do not recognize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentBundle {
    entries: BTreeMap<String, Payload>,
}

impl ContentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bundle holding only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    /// Create a bundle holding only an encoded image.
    pub fn image(bytes: Vec<u8>) -> Self {
        Self::new().with_image_bytes(bytes)
    }

    /// Set the text entry.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.insert(TEXT_KEY, Payload::Text(text.into()));
        self
    }

    /// Set the image entry from encoded bytes.
    pub fn with_image_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.insert(IMAGE_KEY, Payload::Bytes(bytes));
        self
    }

    /// Set the image entry from a file path.
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.insert(IMAGE_KEY, Payload::Path(path.into()));
        self
    }

    /// Set an arbitrary entry.
    pub fn with(mut self, key: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.insert(key, payload.into());
        self
    }

    /// Insert or replace an entry, returning the previous payload.
    pub fn insert(&mut self, key: impl Into<String>, payload: Payload) -> Option<Payload> {
        self.entries.insert(key.into(), payload)
    }

    /// Get an entry.
    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.entries.get(key)
    }

    /// Whether an entry exists and is non-empty.
    pub fn has(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|p| !p.is_empty())
    }

    /// Inline text under `text`, if present.
    pub fn text_content(&self) -> Option<&str> {
        self.get(TEXT_KEY).and_then(Payload::as_text)
    }

    /// Iterate over the keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_set_standard_keys() {
        let bundle = ContentBundle::text("a red car").with_image_bytes(vec![1, 2, 3]);
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.text_content(), Some("a red car"));
        assert_eq!(bundle.get(IMAGE_KEY).and_then(Payload::as_bytes), Some(&[1u8, 2, 3][..]));
        assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["image", "text"]);
    }

    #[test]
    fn test_has_ignores_blank_payloads() {
        let bundle = ContentBundle::text("   ").with("audio", Vec::<u8>::new());
        assert!(!bundle.has(TEXT_KEY));
        assert!(!bundle.has("audio"));
        assert!(!bundle.has(IMAGE_KEY));
    }

    #[tokio::test]
    async fn test_load_text_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello from disk").unwrap();

        let payload = Payload::Path(path);
        assert_eq!(payload.load_text(TEXT_KEY).await.unwrap(), "hello from disk");
    }

    #[tokio::test]
    async fn test_load_bytes_missing_file_is_preprocessing_error() {
        let payload = Payload::Path(PathBuf::from("/definitely/not/here.png"));
        let err = payload.load_bytes(IMAGE_KEY).await.unwrap_err();
        assert_eq!(err.key(), Some(IMAGE_KEY));
    }
}
