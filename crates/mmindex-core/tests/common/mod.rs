//! Shared fixtures for the ingestor integration tests.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mmindex_core::audit::MemoryAuditSink;
use mmindex_core::store::{InMemoryObjectStore, InMemoryVectorStore};
use mmindex_core::traits::IndexInfo;
use mmindex_core::{
    AuditLogger, DistanceMetric, Embedder, EmbeddingInput, ImageDescriber, IndexConfig,
    IndexError, IndexResult, MetadataFilter, MmIngestor, ObjectStore, TextSummarizer,
    VectorMatch, VectorRecord, VectorStore,
};

pub const DIMENSION: usize = 16;

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bag-of-words embedder: each word lands in a hashed bucket, images in the
/// last bucket. Deterministic across runs.
pub struct KeywordEmbedder {
    pub dimension: usize,
}

impl KeywordEmbedder {
    fn bucket(&self, word: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % (self.dimension - 1)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, input: EmbeddingInput<'_>) -> IndexResult<Vec<f32>> {
        if input.is_empty() {
            return Err(IndexError::embedding("nothing to embed"));
        }
        let mut v = vec![0.0; self.dimension];
        if let Some(text) = input.text {
            for word in text.split_whitespace() {
                v[self.bucket(word)] += 1.0;
            }
        }
        if let Some(image) = input.image {
            v[self.dimension - 1] = image.len() as f32;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "keyword"
    }

    fn supports_images(&self) -> bool {
        true
    }
}

/// Embedder that always returns a fixed-length vector, whatever it claims.
pub struct FixedLengthEmbedder {
    pub claimed: usize,
    pub actual: usize,
}

#[async_trait]
impl Embedder for FixedLengthEmbedder {
    async fn embed(&self, _input: EmbeddingInput<'_>) -> IndexResult<Vec<f32>> {
        Ok(vec![0.5; self.actual])
    }

    fn dimension(&self) -> usize {
        self.claimed
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Describes every image the same way.
pub struct StubDescriber;

pub const DESCRIPTION: &str = "a red car parked by the beach";

#[async_trait]
impl ImageDescriber for StubDescriber {
    async fn describe(&self, _image: &[u8]) -> IndexResult<String> {
        Ok(DESCRIPTION.to_string())
    }

    fn model_name(&self) -> &str {
        "stub-vision"
    }
}

/// Keeps the first sentence of the text.
pub struct StubSummarizer;

#[async_trait]
impl TextSummarizer for StubSummarizer {
    async fn summarize(&self, text: &str) -> IndexResult<String> {
        Ok(text.split('.').next().unwrap_or(text).to_string())
    }

    fn model_name(&self) -> &str {
        "stub-summary"
    }
}

/// Object store whose writes always fail.
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> IndexResult<String> {
        Err(IndexError::object_store("put", format!("bucket unavailable for {}", key)))
    }

    async fn get(&self, uri: &str) -> IndexResult<Vec<u8>> {
        Err(IndexError::object_store("get", format!("bucket unavailable for {}", uri)))
    }

    async fn delete(&self, _uri: &str) -> IndexResult<()> {
        Ok(())
    }
}

/// Vector store that records every `put` and counts queries.
#[derive(Default)]
pub struct RecordingVectorStore {
    inner: InMemoryVectorStore,
    puts: Mutex<Vec<VectorRecord>>,
    queries: AtomicUsize,
}

impl RecordingVectorStore {
    pub fn puts(&self) -> Vec<VectorRecord> {
        self.puts.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for RecordingVectorStore {
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> IndexResult<()> {
        self.inner.create_index(name, dimension, metric).await
    }

    async fn put(&self, record: VectorRecord) -> IndexResult<()> {
        self.puts.lock().unwrap().push(record.clone());
        self.inner.put(record).await
    }

    async fn get(&self, id: &str) -> IndexResult<Option<VectorRecord>> {
        self.inner.get(id).await
    }

    async fn query(
        &self,
        vector: &[f32],
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<VectorMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(vector, filters, top_k).await
    }

    async fn delete(&self, id: &str) -> IndexResult<bool> {
        self.inner.delete(id).await
    }

    async fn index_info(&self) -> IndexResult<Option<IndexInfo>> {
        self.inner.index_info().await
    }
}

/// Everything a test needs to inspect after driving an ingestor.
pub struct Harness {
    pub ingestor: MmIngestor,
    pub vectors: Arc<RecordingVectorStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn test_config() -> IndexConfig {
    IndexConfig::builder()
        .index_name("test-index")
        .dimension(DIMENSION)
        .worker_count(3)
        .chunk_size(2)
        .query_pattern("text")
        .without_image_resize()
        .build()
        .unwrap()
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: IndexConfig) -> Harness {
    build_harness(config, false).await
}

/// Harness with describer and summarizer, so all five built-in patterns exist.
pub async fn harness_with_capabilities(config: IndexConfig) -> Harness {
    build_harness(config, true).await
}

async fn build_harness(config: IndexConfig, capabilities: bool) -> Harness {
    init_tracing();
    let vectors = Arc::new(RecordingVectorStore::default());
    let objects = Arc::new(InMemoryObjectStore::new());
    let audit = Arc::new(MemoryAuditSink::new());

    let mut builder = MmIngestor::builder()
        .embedder(Arc::new(KeywordEmbedder {
            dimension: config.dimension,
        }))
        .config(config)
        .vector_store(vectors.clone())
        .object_store(objects.clone())
        .audit_logger(AuditLogger::silent().with_sink(audit.clone()));
    if capabilities {
        builder = builder
            .describer(Arc::new(StubDescriber))
            .summarizer(Arc::new(StubSummarizer));
    }

    Harness {
        ingestor: builder.build().await.unwrap(),
        vectors,
        objects,
        audit,
    }
}

/// A small valid PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}
