//! OCR text extraction from images (requires the Tesseract binary).

use async_trait::async_trait;

use super::Preprocessor;
use crate::error::IndexResult;
use crate::types::{ContentBundle, Payload, IMAGE_KEY, TEXT_KEY};

/// Appends text recognized in the `image` entry to the `text` entry.
///
/// A missing OCR engine or an image without recognizable text leaves the
/// bundle unchanged.
#[derive(Debug, Clone)]
pub struct OcrPreprocessor {
    language: String,
    keys: Vec<String>,
}

impl Default for OcrPreprocessor {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrPreprocessor {
    pub const NAME: &'static str = "ocr";

    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            keys: vec![IMAGE_KEY.to_string()],
        }
    }

    async fn recognize(&self, content: Vec<u8>) -> Option<String> {
        use rusty_tesseract::{Args, Image};

        let language = self.language.clone();
        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&content).ok()?;
            let gray = image::DynamicImage::ImageLuma8(img.to_luma8());
            let tesseract_image = Image::from_dynamic_image(&gray).ok()?;
            let args = Args {
                lang: language,
                ..Args::default()
            };
            rusty_tesseract::image_to_string(&tesseract_image, &args).ok()
        })
        .await
        .ok()
        .flatten()
    }
}

#[async_trait]
impl Preprocessor for OcrPreprocessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supported_keys(&self) -> &[String] {
        &self.keys
    }

    async fn process(&self, mut content: ContentBundle) -> IndexResult<ContentBundle> {
        let Some(payload) = content.get(IMAGE_KEY) else {
            return Ok(content);
        };
        let bytes = payload.load_bytes(IMAGE_KEY).await?;

        let recognized = match self.recognize(bytes).await {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                tracing::debug!("OCR produced no text");
                return Ok(content);
            }
        };

        let combined = match content.text_content() {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}\n\nOCR extracted text: {}", existing, recognized)
            }
            _ => recognized,
        };
        tracing::debug!("OCR extracted {} characters", combined.len());
        content.insert(TEXT_KEY, Payload::Text(combined));
        Ok(content)
    }
}
