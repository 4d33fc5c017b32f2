//! Offline feature-hashing embedder.
//!
//! Words and fixed-size image byte windows are hashed with SHA-256 into
//! signed buckets. The result is deterministic, needs no model, and keeps
//! lexically similar texts close under cosine similarity. Good enough for
//! tests, demos and keyword-style retrieval.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use mmindex_core::error::{IndexError, IndexResult};
use mmindex_core::traits::{Embedder, EmbeddingInput};

const IMAGE_WINDOW: usize = 64;

/// Deterministic text and image embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-length vectors.
    pub fn new(dimension: usize) -> IndexResult<Self> {
        if dimension == 0 {
            return Err(IndexError::Configuration(
                "hashing embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model: format!("feature-hashing-{}", dimension),
        })
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &[u8], feature: &[u8]) {
        let digest = Sha256::new()
            .chain_update(namespace)
            .chain_update(feature)
            .finalize();
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }

    fn text_features(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let mut any = false;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            self.add_feature(&mut vector, b"t:", token.to_lowercase().as_bytes());
            any = true;
        }
        if !any {
            self.add_feature(&mut vector, b"raw:", text.as_bytes());
        }
        normalize(&mut vector);
        vector
    }

    fn image_features(&self, image: &[u8]) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for window in image.chunks(IMAGE_WINDOW) {
            self.add_feature(&mut vector, b"i:", window);
        }
        if image.is_empty() {
            self.add_feature(&mut vector, b"i:", b"");
        }
        normalize(&mut vector);
        vector
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, input: EmbeddingInput<'_>) -> IndexResult<Vec<f32>> {
        let mut vector = match (input.text, input.image) {
            (Some(text), None) => return Ok(self.text_features(text)),
            (None, Some(image)) => return Ok(self.image_features(image)),
            (Some(text), Some(image)) => {
                let image = self.image_features(image);
                let mut joint = self.text_features(text);
                joint.iter_mut().zip(image).for_each(|(t, i)| *t += i);
                joint
            }
            (None, None) => return Err(IndexError::embedding("nothing to embed")),
        };
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_images(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let a = embedder.embed_text("Honda Civic 2019").await.unwrap();
        let b = embedder.embed_text("honda civic 2019").await.unwrap();

        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_text("red honda civic").await.unwrap();
        let close = embedder.embed_text("a red honda civic sedan").await.unwrap();
        let far = embedder.embed_text("quarterly earnings report").await.unwrap();

        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_all_modalities_share_dimension() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let image = vec![7u8; 300];

        let text = embedder.embed(EmbeddingInput::text("cat")).await.unwrap();
        let img = embedder.embed(EmbeddingInput::image(&image)).await.unwrap();
        let joint = embedder
            .embed(EmbeddingInput::multimodal("cat", &image))
            .await
            .unwrap();

        assert_eq!(text.len(), 16);
        assert_eq!(img.len(), 16);
        assert_eq!(joint.len(), 16);
        assert!(embedder.embed(EmbeddingInput::default()).await.is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
