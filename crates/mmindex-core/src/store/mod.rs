//! In-process reference implementations of the storage ports.

mod memory;

pub use memory::{InMemoryObjectStore, InMemoryVectorStore};

use std::cmp::Ordering;

use crate::traits::{matches_filter, DistanceMetric};
use crate::types::{MetadataFilter, VectorMatch, VectorRecord};

/// Brute-force ranking shared by stores without a native ANN index.
///
/// Records failing `filters` are skipped before scoring. Hits are sorted by
/// descending score, ties broken by id, and cut to `top_k`.
pub fn rank_records<'a>(
    records: impl IntoIterator<Item = &'a VectorRecord>,
    query: &[f32],
    metric: DistanceMetric,
    filters: Option<&MetadataFilter>,
    top_k: usize,
) -> Vec<VectorMatch> {
    let mut hits: Vec<VectorMatch> = records
        .into_iter()
        .filter(|record| filters.map_or(true, |f| matches_filter(&record.metadata, f)))
        .map(|record| VectorMatch {
            id: record.id.clone(),
            score: metric.score(query, &record.vector),
            metadata: record.metadata.clone(),
        })
        .collect();

    hits.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    hits.truncate(top_k);
    hits
}
