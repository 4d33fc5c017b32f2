//! Image normalization.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};

use super::Preprocessor;
use crate::error::{IndexError, IndexResult};
use crate::types::{ContentBundle, Payload, IMAGE_KEY};

/// Encoded image format sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormatInfo {
    /// File extension used for object keys.
    pub extension: &'static str,
    /// MIME type used as object content type.
    pub mime_type: &'static str,
}

/// Sniff the format of an encoded image.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormatInfo> {
    let format = image::guess_format(bytes).ok()?;
    let extension = match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        _ => format.extensions_str().first().copied()?,
    };
    Some(ImageFormatInfo {
        extension,
        mime_type: format.to_mime_type(),
    })
}

/// Fits images inside a bounding box, preserving aspect ratio.
///
/// Images already within bounds keep their original encoded bytes, so
/// stored copies round-trip exactly. Larger images are downscaled and
/// re-encoded as PNG. Path payloads are read and rewritten as bytes.
#[derive(Debug, Clone)]
pub struct ImageResizer {
    max_width: u32,
    max_height: u32,
    keys: Vec<String>,
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

impl ImageResizer {
    pub const NAME: &'static str = "image_resizer";

    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            keys: vec![IMAGE_KEY.to_string()],
        }
    }

    /// Resize a different bundle key instead of `image`.
    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.keys = vec![key.into()];
        self
    }

    /// Bounding box as `(width, height)`.
    pub fn bounds(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    fn resize_bytes(
        bytes: Vec<u8>,
        max_width: u32,
        max_height: u32,
    ) -> Result<Vec<u8>, image::ImageError> {
        let img = image::load_from_memory(&bytes)?;
        let (width, height) = img.dimensions();
        if width <= max_width && height <= max_height {
            return Ok(bytes);
        }

        let resized = img.resize(max_width, max_height, FilterType::Lanczos3);
        tracing::debug!(
            "Resized image from {}x{} to {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );

        let mut out = Vec::new();
        resized.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }
}

#[async_trait]
impl Preprocessor for ImageResizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supported_keys(&self) -> &[String] {
        &self.keys
    }

    async fn process(&self, mut content: ContentBundle) -> IndexResult<ContentBundle> {
        for key in &self.keys {
            let Some(payload) = content.get(key) else {
                continue;
            };
            if let Payload::Text(_) = payload {
                return Err(IndexError::preprocessing(
                    key.clone(),
                    "expected image bytes or a file path, got text",
                ));
            }

            let bytes = payload.load_bytes(key).await?;
            if detect_image_format(&bytes).is_none() {
                return Err(IndexError::preprocessing(key.clone(), "unrecognized image format"));
            }

            let (max_width, max_height) = (self.max_width, self.max_height);
            let resized = tokio::task::spawn_blocking(move || {
                Self::resize_bytes(bytes, max_width, max_height)
            })
            .await
            .map_err(|e| IndexError::Internal(format!("Image resize task failed: {}", e)))?
            .map_err(|e| {
                IndexError::preprocessing_with_source(key.clone(), "failed to decode image", e)
            })?;

            content.insert(key.clone(), Payload::Bytes(resized));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let img = DynamicImage::ImageRgb8(pixels);
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn test_detect_image_format() {
        let info = detect_image_format(&png(2, 2)).unwrap();
        assert_eq!(info.extension, "png");
        assert_eq!(info.mime_type, "image/png");
        assert!(detect_image_format(b"plain text, not an image").is_none());
    }

    #[tokio::test]
    async fn test_large_image_is_downscaled_preserving_aspect_ratio() {
        let resizer = ImageResizer::new(64, 64);
        let content = ContentBundle::image(png(256, 128));

        let out = resizer.process(content).await.unwrap();
        let bytes = out.get(IMAGE_KEY).and_then(Payload::as_bytes).unwrap();
        let img = image::load_from_memory(bytes).unwrap();
        assert_eq!(img.dimensions(), (64, 32));
    }

    #[tokio::test]
    async fn test_small_image_keeps_original_bytes() {
        let original = png(16, 16);
        let resizer = ImageResizer::default();
        let out = resizer.process(ContentBundle::image(original.clone())).await.unwrap();
        assert_eq!(out.get(IMAGE_KEY), Some(&Payload::Bytes(original)));
    }

    #[tokio::test]
    async fn test_path_payload_is_read_into_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("car.png");
        let original = png(8, 8);
        std::fs::write(&path, &original).unwrap();

        let out = ImageResizer::default()
            .process(ContentBundle::new().with_image_path(&path))
            .await
            .unwrap();
        assert_eq!(out.get(IMAGE_KEY), Some(&Payload::Bytes(original)));
    }

    #[tokio::test]
    async fn test_corrupt_image_is_preprocessing_error() {
        let mut corrupt = png(8, 8);
        corrupt.truncate(20);
        let err = ImageResizer::default()
            .process(ContentBundle::image(corrupt).with_text("keep me"))
            .await
            .unwrap_err();
        assert_eq!(err.key(), Some(IMAGE_KEY));
    }

    #[tokio::test]
    async fn test_text_under_image_key_is_rejected() {
        let content = ContentBundle::new().with(IMAGE_KEY, "not bytes");
        let err = ImageResizer::default().process(content).await.unwrap_err();
        assert_eq!(err.key(), Some(IMAGE_KEY));
    }
}
