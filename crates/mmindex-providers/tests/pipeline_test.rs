//! End-to-end ingestion on persistent backends with the offline embedder.

use std::sync::Arc;

use serde_json::json;

use mmindex_core::{ContentBundle, IndexConfig, IngestRequest, Metadata, MetadataFilter, MmIngestor};
use mmindex_providers::HashingEmbedder;
use mmindex_stores::{LocalObjectStore, SqliteVectorStore};

async fn ingestor(dir: &std::path::Path) -> MmIngestor {
    let config = IndexConfig::builder()
        .index_name("cars")
        .dimension(64)
        .query_pattern("hybrid")
        .without_image_resize()
        .build()
        .unwrap();

    MmIngestor::builder()
        .config(config)
        .vector_store(Arc::new(SqliteVectorStore::new(dir.join("vectors.db")).unwrap()))
        .object_store(Arc::new(LocalObjectStore::new(dir.join("objects")).unwrap()))
        .embedder(Arc::new(HashingEmbedder::new(64).unwrap()))
        .build()
        .await
        .unwrap()
}

fn car(make: &str, model: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("make".to_string(), json!(make));
    metadata.insert("model".to_string(), json!(model));
    metadata
}

#[tokio::test]
async fn test_hybrid_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let photo = b"GIF89a-red-civic".to_vec();

    {
        let ingestor = ingestor(dir.path()).await;
        let content = ContentBundle::text("red honda civic coupe").with_image_bytes(photo.clone());
        ingestor
            .ingest_with_id("civic-1", content, car("Honda", "Civic"), "hybrid")
            .await
            .unwrap();
    }

    let ingestor = ingestor(dir.path()).await;
    let hits = ingestor
        .search(ContentBundle::text("red civic"), None, 3)
        .await
        .unwrap();

    assert_eq!(hits[0].id, "civic-1");
    assert_eq!(hits[0].pattern(), Some("hybrid"));
    assert_eq!(hits[0].original_image.as_deref(), Some(photo.as_slice()));

    assert!(ingestor.delete("civic-1").await.unwrap());
    assert!(ingestor.get("civic-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_filtered_batch_search() {
    let dir = tempfile::tempdir().unwrap();
    let ingestor = ingestor(dir.path()).await;

    let docs = [
        ("a", "Honda", "Civic", "red honda civic sedan"),
        ("b", "Honda", "Civic", "blue honda civic hatchback"),
        ("c", "Honda", "Accord", "silver honda accord"),
        ("d", "Toyota", "Corolla", "red toyota corolla"),
    ];
    let requests: Vec<IngestRequest> = docs
        .iter()
        .map(|(id, make, model, text)| {
            IngestRequest::new(ContentBundle::text(*text))
                .with_id(*id)
                .with_metadata(car(make, model))
        })
        .collect();

    let result = ingestor.batch_ingest(requests, "text", None).await.unwrap();
    assert!(result.is_complete_success());

    let mut filters = MetadataFilter::new();
    filters.insert("make".to_string(), json!("Honda"));
    filters.insert("model".to_string(), json!("Civic"));
    let hits = ingestor
        .search_with_pattern(ContentBundle::text("red civic"), "text", Some(filters), 5)
        .await
        .unwrap();

    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"a") && ids.contains(&"b"));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}
