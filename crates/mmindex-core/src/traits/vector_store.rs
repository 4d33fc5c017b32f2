//! Vector store trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::IndexResult;
use crate::types::{Metadata, MetadataFilter, VectorMatch, VectorRecord};

/// Distance metric for vector similarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    /// Similarity score between two vectors; higher is more similar.
    ///
    /// Cosine returns the cosine similarity in `[-1, 1]`. Euclidean maps the
    /// L2 distance `d` to `1 / (1 + d)` so both metrics rank descending.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Euclidean => {
                let distance: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Element type of stored vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DataType {
    #[default]
    Float32,
}

/// Whether stored metadata satisfies an exact-match filter.
///
/// Every filter entry must be present with an equal value. Numbers compare
/// by value so `1` matches `1.0`.
pub fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, expected)| match metadata.get(key) {
        Some(actual) => values_equal(actual, expected),
        None => false,
    })
}

fn values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Description of a created index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Number of stored vectors.
    pub count: usize,
}

/// Core VectorStore trait - all vector store backends implement this.
///
/// Backends must reject writes whose vector length differs from the index
/// dimension, and must return query hits in descending score order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create (or open) the index. Calling again with the same parameters is a no-op.
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> IndexResult<()>;

    /// Insert or replace a record.
    async fn put(&self, record: VectorRecord) -> IndexResult<()>;

    /// Get a record by id.
    async fn get(&self, id: &str) -> IndexResult<Option<VectorRecord>>;

    /// Find the `top_k` nearest records that match `filters`.
    async fn query(
        &self,
        vector: &[f32],
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<VectorMatch>>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, id: &str) -> IndexResult<bool>;

    /// Describe the index, `None` before `create_index`.
    async fn index_info(&self) -> IndexResult<Option<IndexInfo>>;

    /// Configured dimension, `None` before `create_index`.
    async fn dimension(&self) -> IndexResult<Option<usize>> {
        Ok(self.index_info().await?.map(|info| info.dimension))
    }

    /// Index name, `None` before `create_index`.
    async fn index_name(&self) -> IndexResult<Option<String>> {
        Ok(self.index_info().await?.map(|info| info.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_euclidean_score_ranks_closer_higher() {
        let metric = DistanceMetric::Euclidean;
        let near = metric.score(&[1.0, 0.0], &[0.9, 0.1]);
        let far = metric.score(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_eq!(metric.score(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert!(near > far);
    }

    #[test]
    fn test_matches_filter() {
        let mut metadata = Metadata::new();
        metadata.insert("make".into(), json!("Honda"));
        metadata.insert("year".into(), json!(2020));

        let mut filter = MetadataFilter::new();
        filter.insert("make".into(), json!("Honda"));
        assert!(matches_filter(&metadata, &filter));

        filter.insert("year".into(), json!(2020.0));
        assert!(matches_filter(&metadata, &filter));

        filter.insert("model".into(), json!("Civic"));
        assert!(!matches_filter(&metadata, &filter));
    }

    #[test]
    fn test_metric_parses_case_insensitively() {
        assert_eq!("COSINE".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!(DistanceMetric::Euclidean.to_string(), "euclidean");
    }
}
