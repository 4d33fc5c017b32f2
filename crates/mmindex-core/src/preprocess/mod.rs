//! Content preprocessing applied before pattern processing.
//!
//! A [`PreprocessorChain`] runs its [`Preprocessor`]s in registration order.
//! Each preprocessor only touches the keys it declares; a preprocessor whose
//! keys are absent from the bundle is skipped. The first failure aborts the
//! chain and no partially processed bundle escapes.

mod resize;
#[cfg(feature = "ocr")]
mod ocr;

pub use resize::{detect_image_format, ImageFormatInfo, ImageResizer};
#[cfg(feature = "ocr")]
pub use ocr::OcrPreprocessor;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{IndexError, IndexResult};
use crate::types::ContentBundle;

/// Transforms one or more content fields into a normalized form.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    /// Unique name within a chain.
    fn name(&self) -> &str;

    /// Bundle keys this preprocessor reads and may rewrite.
    fn supported_keys(&self) -> &[String];

    /// Whether the bundle holds anything this preprocessor handles.
    fn should_process(&self, content: &ContentBundle) -> bool {
        self.supported_keys().iter().any(|key| content.has(key))
    }

    /// Process the bundle. Keys outside [`Preprocessor::supported_keys`]
    /// must be returned untouched.
    async fn process(&self, content: ContentBundle) -> IndexResult<ContentBundle>;
}

/// Ordered sequence of preprocessors.
#[derive(Clone, Default)]
pub struct PreprocessorChain {
    steps: Vec<Arc<dyn Preprocessor>>,
}

impl std::fmt::Debug for PreprocessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessorChain")
            .field("steps", &self.names())
            .finish()
    }
}

impl PreprocessorChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a preprocessor, replacing any existing one with the same name in place.
    pub fn add(&mut self, preprocessor: Arc<dyn Preprocessor>) {
        if let Some(slot) = self
            .steps
            .iter_mut()
            .find(|p| p.name() == preprocessor.name())
        {
            tracing::warn!("Replacing preprocessor '{}'", preprocessor.name());
            *slot = preprocessor;
        } else {
            tracing::debug!("Added preprocessor '{}'", preprocessor.name());
            self.steps.push(preprocessor);
        }
    }

    /// Builder-style [`PreprocessorChain::add`].
    pub fn with(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.add(preprocessor);
        self
    }

    /// Remove a preprocessor by name.
    pub fn remove(&mut self, name: &str) -> IndexResult<Arc<dyn Preprocessor>> {
        let position = self
            .steps
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| {
                IndexError::invalid_input(format!(
                    "Preprocessor '{}' not found. Available: {:?}",
                    name,
                    self.names()
                ))
            })?;
        Ok(self.steps.remove(position))
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|p| p.name().to_string()).collect()
    }

    /// Whether a preprocessor with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|p| p.name() == name)
    }

    /// Names of the preprocessors that would run on this bundle.
    pub fn applicable(&self, content: &ContentBundle) -> Vec<String> {
        self.steps
            .iter()
            .filter(|p| p.should_process(content))
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Remove every preprocessor.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the chain.
    pub async fn process(&self, content: ContentBundle) -> IndexResult<ContentBundle> {
        self.process_with_report(content).await.map(|(content, _)| content)
    }

    /// Run the chain, also returning the names of the steps that ran.
    pub async fn process_with_report(
        &self,
        mut content: ContentBundle,
    ) -> IndexResult<(ContentBundle, Vec<String>)> {
        let mut applied = Vec::new();

        for (step, preprocessor) in self.steps.iter().enumerate() {
            if !preprocessor.should_process(&content) {
                tracing::debug!("Skipping preprocessor '{}'", preprocessor.name());
                continue;
            }

            let fallback_key = preprocessor
                .supported_keys()
                .iter()
                .find(|key| content.has(key))
                .cloned()
                .unwrap_or_default();

            content = preprocessor
                .process(content)
                .await
                .map_err(|e| step_failure(step, preprocessor.name(), fallback_key, e))?;
            applied.push(preprocessor.name().to_string());
        }

        Ok((content, applied))
    }
}

fn step_failure(step: usize, name: &str, fallback_key: String, error: IndexError) -> IndexError {
    tracing::warn!("Preprocessing failed at step {} ({}): {}", step, name, error);
    match error {
        IndexError::Preprocessing {
            key,
            message,
            code,
            source,
        } => IndexError::Preprocessing {
            key,
            message: format!("step {} ({}): {}", step, name, message),
            code,
            source,
        },
        other => IndexError::Preprocessing {
            key: fallback_key,
            message: format!("step {} ({}): {}", step, name, other),
            code: other.code(),
            source: Some(Box::new(other)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, TEXT_KEY};

    struct Upper {
        keys: Vec<String>,
    }

    #[async_trait]
    impl Preprocessor for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn supported_keys(&self) -> &[String] {
            &self.keys
        }

        async fn process(&self, mut content: ContentBundle) -> IndexResult<ContentBundle> {
            if let Some(text) = content.text_content().map(str::to_uppercase) {
                content.insert(TEXT_KEY, Payload::Text(text));
            }
            Ok(content)
        }
    }

    struct Failing {
        keys: Vec<String>,
    }

    #[async_trait]
    impl Preprocessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn supported_keys(&self) -> &[String] {
            &self.keys
        }

        async fn process(&self, _content: ContentBundle) -> IndexResult<ContentBundle> {
            Err(IndexError::Internal("boom".into()))
        }
    }

    fn upper() -> Arc<dyn Preprocessor> {
        Arc::new(Upper {
            keys: vec![TEXT_KEY.to_string()],
        })
    }

    #[tokio::test]
    async fn test_chain_applies_in_order_and_keeps_unknown_keys() {
        let chain = PreprocessorChain::new().with(upper());
        let content = ContentBundle::text("honda civic").with("audio", vec![1u8, 2]);

        let (out, applied) = chain.process_with_report(content).await.unwrap();
        assert_eq!(out.text_content(), Some("HONDA CIVIC"));
        assert_eq!(out.get("audio"), Some(&Payload::Bytes(vec![1, 2])));
        assert_eq!(applied, vec!["upper"]);
    }

    #[tokio::test]
    async fn test_chain_skips_when_key_absent() {
        let chain = PreprocessorChain::new().with(upper());
        let content = ContentBundle::image(vec![0u8; 4]);
        let (out, applied) = chain.process_with_report(content.clone()).await.unwrap();
        assert_eq!(out, content);
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_failure_names_step_and_key() {
        let chain = PreprocessorChain::new().with(upper()).with(Arc::new(Failing {
            keys: vec![TEXT_KEY.to_string()],
        }));
        let err = chain.process(ContentBundle::text("x")).await.unwrap_err();
        assert_eq!(err.key(), Some("text"));
        assert!(err.to_string().contains("step 1 (failing)"));
    }

    #[test]
    fn test_management_operations() {
        let mut chain = PreprocessorChain::new();
        chain.add(upper());
        chain.add(upper());
        assert_eq!(chain.len(), 1);
        assert!(chain.contains("upper"));
        assert!(chain.remove("missing").is_err());
        chain.remove("upper").unwrap();
        assert!(chain.is_empty());
    }
}
