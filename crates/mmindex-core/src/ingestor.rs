//! The `MmIngestor` facade.
//!
//! Wires the preprocessor chain, pattern engine, validator, audit logger and
//! storage ports together. Ingest runs
//! preprocess -> pattern -> limit -> validate -> persist -> audit;
//! search embeds the query with a pattern, queries the vector store and
//! fetches referenced originals from the object store.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::json;
use tracing::Instrument;

use crate::audit::{AuditLogger, OperationKind};
use crate::batch::{BatchProcessor, ItemProcessor};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::patterns::{
    PatternDependencies, PatternEngine, PatternInfo, PatternOutput, PatternStrategy,
};
use crate::preprocess::{ImageResizer, Preprocessor, PreprocessorChain};
use crate::traits::{Embedder, ImageDescriber, ObjectStore, TextSummarizer, VectorStore};
use crate::types::{
    keys, BatchResult, ContentBundle, IngestRequest, Metadata, MetadataFilter, SearchResult,
    VectorMatch, VectorRecord,
};
use crate::validation::{MetadataLimiter, Validator, Violation};

/// Multimodal ingestion and search facade.
///
/// Cheap to clone; clones share ports, preprocessors and patterns.
#[derive(Clone)]
pub struct MmIngestor {
    inner: Arc<Pipeline>,
}

struct Pipeline {
    config: IndexConfig,
    vector_store: Arc<dyn VectorStore>,
    object_store: Arc<dyn ObjectStore>,
    preprocessors: RwLock<PreprocessorChain>,
    patterns: RwLock<PatternEngine>,
    validator: Validator,
    limiter: Option<MetadataLimiter>,
    audit: AuditLogger,
}

/// Candidates fetched per requested result, so slot hits can be merged.
const QUERY_FANOUT: usize = 2;

fn poisoned(what: &str) -> IndexError {
    IndexError::Internal(format!("{} lock poisoned", what))
}

impl Pipeline {
    fn pattern(&self, name: &str) -> IndexResult<Arc<dyn PatternStrategy>> {
        self.patterns
            .read()
            .map_err(|_| poisoned("pattern engine"))?
            .get(name)
    }

    fn chain(&self) -> IndexResult<PreprocessorChain> {
        Ok(self
            .preprocessors
            .read()
            .map_err(|_| poisoned("preprocessor chain"))?
            .clone())
    }

    /// Run the ingest pipeline for one document and persist every slot.
    async fn ingest_document(
        &self,
        doc_id: &str,
        content: ContentBundle,
        mut metadata: Metadata,
        pattern_name: &str,
        audit: &crate::audit::OperationAudit,
    ) -> IndexResult<()> {
        let pattern = self.pattern(pattern_name)?;
        pattern.validate_content(&content)?;

        let (content, applied) = self.chain()?.process_with_report(content).await?;
        self.audit.log_preprocessing(audit, &applied);

        metadata.insert(keys::DOC_ID.to_string(), json!(doc_id));
        let output = pattern.process(doc_id, &content, metadata).await?;
        self.audit
            .log_pattern_processing(audit, pattern.name(), output.embeddings.len());

        let uploaded: Vec<String> = [keys::IMAGE_REF, keys::TEXT_REF]
            .iter()
            .filter_map(|key| output.metadata.get(*key)?.as_str().map(str::to_string))
            .collect();

        match self.persist(doc_id, pattern.name(), output).await {
            Ok(()) => {
                tracing::debug!("Persisted {} with pattern '{}'", doc_id, pattern.name());
                Ok(())
            }
            Err(e) => {
                self.discard_objects(doc_id, &uploaded).await;
                Err(e)
            }
        }
    }

    /// Limit, validate and write every slot of a processed document.
    async fn persist(
        &self,
        doc_id: &str,
        pattern_name: &str,
        output: PatternOutput,
    ) -> IndexResult<()> {
        if output.embeddings.is_empty() {
            return Err(IndexError::Internal(format!(
                "pattern '{}' produced no embeddings",
                pattern_name
            )));
        }

        let mut metadata = match &self.limiter {
            Some(limiter) => limiter.limit(output.metadata),
            None => output.metadata,
        };

        let secondary: Vec<&str> = output.embeddings[1..]
            .iter()
            .map(|slot| slot.name.as_str())
            .collect();
        if !secondary.is_empty() {
            metadata.insert(keys::SLOTS.to_string(), json!(secondary));
        }

        let records: Vec<VectorRecord> = output
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                if i == 0 {
                    VectorRecord::new(doc_id, slot.vector.clone(), metadata.clone())
                } else {
                    let mut slot_metadata = metadata.clone();
                    slot_metadata.remove(keys::SLOTS);
                    slot_metadata.insert(keys::SLOT.to_string(), json!(slot.name));
                    slot_metadata.insert(keys::PARENT_ID.to_string(), json!(doc_id));
                    VectorRecord::new(
                        format!("{}#{}", doc_id, slot.name),
                        slot.vector.clone(),
                        slot_metadata,
                    )
                }
            })
            .collect();

        // Every slot is checked before the first write.
        for record in &records {
            self.validator
                .validate(&record.vector, &record.metadata, self.config.dimension)?;
        }

        let mut written: Vec<String> = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            if let Err(e) = self.vector_store.put(record).await {
                for id in &written {
                    if let Err(cleanup) = self.vector_store.delete(id).await {
                        tracing::warn!("Failed to roll back record {}: {}", id, cleanup);
                    }
                }
                return Err(e);
            }
            written.push(id);
        }
        Ok(())
    }

    /// Best-effort removal of objects uploaded for a document that was not stored.
    ///
    /// Objects still referenced by an earlier version of the document are kept.
    async fn discard_objects(&self, doc_id: &str, uris: &[String]) {
        let previous = match self.vector_store.get(doc_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Keeping objects of {}, lookup failed: {}", doc_id, e);
                return;
            }
        };
        let referenced = |uri: &str| {
            previous.as_ref().is_some_and(|record| {
                [keys::IMAGE_REF, keys::TEXT_REF]
                    .iter()
                    .any(|key| record.get_string(key) == Some(uri))
            })
        };

        for uri in uris.iter().filter(|uri| !referenced(uri.as_str())) {
            match self.object_store.delete(uri).await {
                Ok(_) => tracing::debug!("Removed orphaned object {} of {}", uri, doc_id),
                Err(e) => tracing::warn!("Failed to remove object {} of {}: {}", uri, doc_id, e),
            }
        }
    }

    async fn fetch_originals(&self, result: &mut SearchResult) {
        if let Some(uri) = result.metadata.get(keys::IMAGE_REF).and_then(|v| v.as_str()) {
            match self.object_store.get(uri).await {
                Ok(bytes) => result.original_image = Some(bytes),
                Err(e) => tracing::warn!("Failed to fetch image for {}: {}", result.id, e),
            }
        }
        if let Some(uri) = result.metadata.get(keys::TEXT_REF).and_then(|v| v.as_str()) {
            match self.object_store.get(uri).await {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => result.original_text = Some(text),
                    Err(e) => tracing::warn!("Stored text for {} is not UTF-8: {}", result.id, e),
                },
                Err(e) => tracing::warn!("Failed to fetch text for {}: {}", result.id, e),
            }
        }
    }
}

#[async_trait]
impl ItemProcessor for Pipeline {
    async fn process_item(
        &self,
        batch_id: &str,
        index: usize,
        request: IngestRequest,
        pattern: &str,
    ) -> IndexResult<String> {
        let doc_id = request
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut metadata = request.metadata;
        metadata.insert(keys::BATCH_ID.to_string(), json!(batch_id));
        metadata.insert(keys::BATCH_INDEX.to_string(), json!(index));

        let mut op = self
            .audit
            .begin(OperationKind::BatchItem)
            .with_parent(batch_id)
            .with_pattern(pattern);
        op.set_document_id(doc_id.clone());
        op.set_context(keys::BATCH_INDEX, index);

        let span = tracing::debug_span!(
            "batch_item",
            correlation_id = %op.correlation_id(),
            index = index,
            doc_id = %doc_id
        );
        match self
            .ingest_document(&doc_id, request.content, metadata, pattern, &op)
            .instrument(span)
            .await
        {
            Ok(()) => {
                self.audit.succeed(op);
                Ok(doc_id)
            }
            Err(e) => {
                self.audit.fail(op, &e);
                Err(e)
            }
        }
    }
}

impl MmIngestor {
    /// Start building an ingestor.
    pub fn builder() -> MmIngestorBuilder {
        MmIngestorBuilder::default()
    }

    /// Ingest one document under a generated UUID v4 id.
    pub async fn ingest(
        &self,
        content: ContentBundle,
        metadata: Metadata,
        pattern: &str,
    ) -> IndexResult<String> {
        let doc_id = uuid::Uuid::new_v4().to_string();
        self.ingest_with_id(&doc_id, content, metadata, pattern).await
    }

    /// Ingest one document under a caller-supplied id.
    ///
    /// Re-ingesting the same id replaces the stored record.
    pub async fn ingest_with_id(
        &self,
        doc_id: &str,
        content: ContentBundle,
        metadata: Metadata,
        pattern: &str,
    ) -> IndexResult<String> {
        let mut op = self
            .inner
            .audit
            .begin(OperationKind::Ingest)
            .with_pattern(pattern);
        op.set_document_id(doc_id);

        let result = if doc_id.trim().is_empty() {
            Err(IndexError::invalid_input("document id must not be empty"))
        } else {
            let span = tracing::info_span!(
                "ingest",
                correlation_id = %op.correlation_id(),
                pattern = pattern,
                doc_id = doc_id
            );
            self.inner
                .ingest_document(doc_id, content, metadata, pattern, &op)
                .instrument(span)
                .await
        };

        match result {
            Ok(()) => {
                self.inner.audit.succeed(op);
                Ok(doc_id.to_string())
            }
            Err(e) => {
                self.inner.audit.fail(op, &e);
                Err(e)
            }
        }
    }

    /// Ingest many documents with one pattern.
    ///
    /// Entries of `metadata_list` are merged into the matching request's
    /// metadata. Item failures are reported in the result; the call itself
    /// only fails when the batch cannot run at all.
    pub async fn batch_ingest<R>(
        &self,
        items: Vec<R>,
        pattern: &str,
        metadata_list: Option<Vec<Metadata>>,
    ) -> IndexResult<BatchResult>
    where
        R: Into<IngestRequest>,
    {
        let mut op = self
            .inner
            .audit
            .begin(OperationKind::BatchIngest)
            .with_pattern(pattern);
        op.set_context("total", items.len());

        let span = tracing::info_span!(
            "batch_ingest",
            correlation_id = %op.correlation_id(),
            pattern = pattern,
            items = items.len()
        );
        let result = self
            .run_batch(op.correlation_id().to_string(), items, pattern, metadata_list)
            .instrument(span)
            .await;

        match result {
            Ok(batch) => {
                op.set_context("succeeded", batch.succeeded());
                op.set_context("failed", batch.failed());
                self.inner.audit.succeed(op);
                Ok(batch)
            }
            Err(e) => {
                self.inner.audit.fail(op, &e);
                Err(e)
            }
        }
    }

    async fn run_batch<R>(
        &self,
        batch_id: String,
        items: Vec<R>,
        pattern: &str,
        metadata_list: Option<Vec<Metadata>>,
    ) -> IndexResult<BatchResult>
    where
        R: Into<IngestRequest>,
    {
        let mut requests: Vec<IngestRequest> = items.into_iter().map(Into::into).collect();

        if let Some(list) = metadata_list {
            if list.len() != requests.len() {
                return Err(IndexError::invalid_input(format!(
                    "metadata_list has {} entries but {} items were given",
                    list.len(),
                    requests.len()
                )));
            }
            for (request, extra) in requests.iter_mut().zip(list) {
                request.metadata.extend(extra);
            }
        }

        // Unknown patterns fail the whole batch before any item runs.
        self.inner.pattern(pattern)?;

        let processor = BatchProcessor::new(self.inner.clone());
        processor
            .run_with_id(
                &batch_id,
                requests,
                pattern,
                self.inner.config.chunk_size,
                self.inner.config.worker_count,
            )
            .await
    }

    /// Search with the configured query pattern.
    pub async fn search(
        &self,
        query: ContentBundle,
        filters: Option<MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<SearchResult>> {
        let pattern = self.inner.config.query_pattern.clone();
        self.search_with_pattern(query, &pattern, filters, top_k)
            .await
    }

    /// Search, embedding the query with a named pattern.
    pub async fn search_with_pattern(
        &self,
        query: ContentBundle,
        pattern: &str,
        filters: Option<MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<SearchResult>> {
        let mut op = self
            .inner
            .audit
            .begin(OperationKind::Search)
            .with_pattern(pattern);
        op.set_context("top_k", top_k);

        let span = tracing::info_span!(
            "search",
            correlation_id = %op.correlation_id(),
            pattern = pattern,
            top_k = top_k
        );
        let result = self
            .run_search(query, pattern, filters.as_ref(), top_k)
            .instrument(span)
            .await;

        match result {
            Ok(results) => {
                op.set_context("results", results.len());
                self.inner.audit.succeed(op);
                Ok(results)
            }
            Err(e) => {
                self.inner.audit.fail(op, &e);
                Err(e)
            }
        }
    }

    async fn run_search(
        &self,
        query: ContentBundle,
        pattern_name: &str,
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(IndexError::invalid_input("top_k must be greater than 0"));
        }
        if query.is_empty() {
            return Err(IndexError::invalid_input("search query has no content"));
        }

        let pattern = self.inner.pattern(pattern_name)?;
        let query = self.inner.chain()?.process(query).await?;
        let vector = pattern.embed_query(&query).await?;

        let expected = self.inner.config.dimension;
        if vector.len() != expected {
            return Err(IndexError::validation(vec![Violation::DimensionMismatch {
                expected,
                actual: vector.len(),
            }]));
        }

        let hits = self.best_per_document(&vector, filters, top_k).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let parent = hit
                .metadata
                .get(keys::PARENT_ID)
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let mut result = match parent {
                Some(parent) => {
                    let Some(primary) = self.inner.vector_store.get(&parent).await? else {
                        tracing::warn!("Slot record {} has no primary record", hit.id);
                        continue;
                    };
                    SearchResult::from(VectorMatch {
                        id: primary.id,
                        score: hit.score,
                        metadata: primary.metadata,
                    })
                }
                None => SearchResult::from(hit),
            };
            self.inner.fetch_originals(&mut result).await;
            results.push(result);
        }
        Ok(results)
    }

    /// Query until `top_k` distinct documents are found or the index runs out,
    /// keeping the best-scoring hit of each document.
    async fn best_per_document(
        &self,
        vector: &[f32],
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<VectorMatch>> {
        let mut k = top_k.saturating_mul(QUERY_FANOUT);
        loop {
            let hits = self.inner.vector_store.query(vector, filters, k).await?;
            let exhausted = hits.len() < k;
            tracing::debug!("Query for {} returned {} hits", k, hits.len());

            let mut seen = HashSet::new();
            let best: Vec<VectorMatch> = hits
                .into_iter()
                .filter(|hit| {
                    let doc = hit
                        .metadata
                        .get(keys::PARENT_ID)
                        .and_then(|v| v.as_str())
                        .unwrap_or(&hit.id);
                    seen.insert(doc.to_string())
                })
                .take(top_k)
                .collect();

            if best.len() >= top_k || exhausted || k == usize::MAX {
                return Ok(best);
            }
            k = k.saturating_mul(2);
        }
    }

    /// Fetch a stored record.
    pub async fn get(&self, doc_id: &str) -> IndexResult<Option<VectorRecord>> {
        self.inner.vector_store.get(doc_id).await
    }

    /// Delete a document, its slot records and its stored originals.
    ///
    /// Returns whether the document existed. Object deletion is best effort.
    pub async fn delete(&self, doc_id: &str) -> IndexResult<bool> {
        let mut op = self.inner.audit.begin(OperationKind::Delete);
        op.set_document_id(doc_id);

        let span = tracing::info_span!(
            "delete",
            correlation_id = %op.correlation_id(),
            doc_id = doc_id
        );
        let result = self.delete_document(doc_id).instrument(span).await;

        match result {
            Ok(existed) => {
                op.set_context("existed", existed);
                self.inner.audit.succeed(op);
                Ok(existed)
            }
            Err(e) => {
                self.inner.audit.fail(op, &e);
                Err(e)
            }
        }
    }

    async fn delete_document(&self, doc_id: &str) -> IndexResult<bool> {
        let Some(record) = self.inner.vector_store.get(doc_id).await? else {
            return Ok(false);
        };

        if let Some(slots) = record.metadata.get(keys::SLOTS).and_then(|v| v.as_array()) {
            for slot in slots.iter().filter_map(|s| s.as_str()) {
                self.inner
                    .vector_store
                    .delete(&format!("{}#{}", doc_id, slot))
                    .await?;
            }
        }
        let existed = self.inner.vector_store.delete(doc_id).await?;

        for key in [keys::IMAGE_REF, keys::TEXT_REF] {
            if let Some(uri) = record.get_string(key) {
                if let Err(e) = self.inner.object_store.delete(uri).await {
                    tracing::warn!("Failed to delete object {} for {}: {}", uri, doc_id, e);
                }
            }
        }
        Ok(existed)
    }

    /// Append a preprocessor, replacing one with the same name in place.
    pub fn add_preprocessor(&self, preprocessor: Arc<dyn Preprocessor>) -> IndexResult<()> {
        self.inner
            .preprocessors
            .write()
            .map_err(|_| poisoned("preprocessor chain"))?
            .add(preprocessor);
        Ok(())
    }

    /// Remove a preprocessor by name.
    pub fn remove_preprocessor(&self, name: &str) -> IndexResult<Arc<dyn Preprocessor>> {
        self.inner
            .preprocessors
            .write()
            .map_err(|_| poisoned("preprocessor chain"))?
            .remove(name)
    }

    /// Preprocessor names in chain order.
    pub fn preprocessors(&self) -> IndexResult<Vec<String>> {
        Ok(self.inner.chain()?.names())
    }

    /// Register a pattern, replacing one with the same name.
    pub fn register_pattern(&self, pattern: Arc<dyn PatternStrategy>) -> IndexResult<()> {
        self.inner
            .patterns
            .write()
            .map_err(|_| poisoned("pattern engine"))?
            .register(pattern);
        Ok(())
    }

    /// Registered pattern names, sorted.
    pub fn patterns(&self) -> IndexResult<Vec<String>> {
        Ok(self
            .inner
            .patterns
            .read()
            .map_err(|_| poisoned("pattern engine"))?
            .names())
    }

    /// Describe a registered pattern.
    pub fn pattern_info(&self, name: &str) -> IndexResult<PatternInfo> {
        self.inner
            .patterns
            .read()
            .map_err(|_| poisoned("pattern engine"))?
            .info(name)
    }

    /// The configuration this ingestor was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }
}

/// Builder for [`MmIngestor`].
#[derive(Default)]
pub struct MmIngestorBuilder {
    config: Option<IndexConfig>,
    vector_store: Option<Arc<dyn VectorStore>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    describer: Option<Arc<dyn ImageDescriber>>,
    summarizer: Option<Arc<dyn TextSummarizer>>,
    preprocessors: Vec<Arc<dyn Preprocessor>>,
    patterns: Vec<Arc<dyn PatternStrategy>>,
    audit: Option<AuditLogger>,
}

impl MmIngestorBuilder {
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Enables the `describe` pattern.
    pub fn describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.describer = Some(describer);
        self
    }

    /// Enables the `summarize` pattern.
    pub fn summarizer(mut self, summarizer: Arc<dyn TextSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Append a preprocessor after the configured image resizer.
    pub fn preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessors.push(preprocessor);
        self
    }

    /// Register a custom pattern alongside the built-in ones.
    pub fn pattern(mut self, pattern: Arc<dyn PatternStrategy>) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Use a custom audit logger instead of the tracing one.
    pub fn audit_logger(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Validate the wiring, create the index and build the ingestor.
    pub async fn build(self) -> IndexResult<MmIngestor> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let vector_store = self
            .vector_store
            .ok_or_else(|| IndexError::Configuration("a vector store is required".to_string()))?;
        let object_store = self
            .object_store
            .ok_or_else(|| IndexError::Configuration("an object store is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| IndexError::Configuration("an embedder is required".to_string()))?;

        if embedder.dimension() != config.dimension {
            return Err(IndexError::Configuration(format!(
                "embedder '{}' produces {} dimensions but the index expects {}",
                embedder.model_name(),
                embedder.dimension(),
                config.dimension
            )));
        }

        let mut chain = PreprocessorChain::new();
        if config.image_resize.enabled {
            chain.add(Arc::new(ImageResizer::new(
                config.image_resize.max_width,
                config.image_resize.max_height,
            )));
        }
        for preprocessor in self.preprocessors {
            chain.add(preprocessor);
        }

        let mut engine = PatternEngine::with_defaults(PatternDependencies {
            embedder,
            object_store: object_store.clone(),
            describer: self.describer,
            summarizer: self.summarizer,
            summarize_min_length: config.summarize_min_length,
        });
        for pattern in self.patterns {
            engine.register(pattern);
        }
        if !engine.contains(&config.query_pattern) {
            return Err(IndexError::Configuration(format!(
                "query_pattern '{}' is not registered (available: {})",
                config.query_pattern,
                engine.names().join(", ")
            )));
        }

        vector_store
            .create_index(&config.index_name, config.dimension, config.distance_metric)
            .await?;

        tracing::info!(
            "MmIngestor ready: index '{}' (dim {}, {}), patterns {:?}, preprocessors {:?}",
            config.index_name,
            config.dimension,
            config.distance_metric,
            engine.names(),
            chain.names()
        );

        Ok(MmIngestor {
            inner: Arc::new(Pipeline {
                validator: Validator::new(config.max_metadata_bytes)
                    .with_data_type(config.data_type),
                limiter: config.metadata_limits.clone().map(MetadataLimiter::new),
                audit: self.audit.unwrap_or_default(),
                vector_store,
                object_store,
                preprocessors: RwLock::new(chain),
                patterns: RwLock::new(engine),
                config,
            }),
        })
    }
}
