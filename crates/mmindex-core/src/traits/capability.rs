//! Text-generation capabilities used by the describe and summarize patterns.

use async_trait::async_trait;

use crate::error::IndexResult;

/// Prompt used when no custom description prompt is configured.
pub const DEFAULT_DESCRIBE_PROMPT: &str =
    "Describe this image in detail. Include the objects, people, setting, colors and any visible text.";

/// Prompt used when no custom summary prompt is configured.
pub const DEFAULT_SUMMARIZE_PROMPT: &str =
    "Summarize the following text concisely while keeping every key fact:";

/// Produces a textual description of an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe an encoded image.
    async fn describe(&self, image: &[u8]) -> IndexResult<String>;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// Produces a shorter summary of a text.
#[async_trait]
pub trait TextSummarizer: Send + Sync {
    /// Summarize a text.
    async fn summarize(&self, text: &str) -> IndexResult<String>;

    /// Get the model name.
    fn model_name(&self) -> &str;
}
