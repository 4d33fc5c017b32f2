//! Chunked, bounded-concurrency batch execution.
//!
//! Items are split into chunks of `chunk_size`. Chunks run one after another;
//! inside a chunk at most `worker_count` items run at once. Each item's
//! outcome is written into the slot of its original position, so the result
//! keeps input order regardless of completion order. A failing or panicking
//! item only fills its own slot.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{BatchItemError, IndexError, IndexResult};
use crate::types::{BatchItemOutcome, BatchResult, IngestRequest};

/// Per-item pipeline driven by the [`BatchProcessor`].
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Process one item and return its document id.
    async fn process_item(
        &self,
        batch_id: &str,
        index: usize,
        request: IngestRequest,
        pattern: &str,
    ) -> IndexResult<String>;
}

/// Runs batches through an [`ItemProcessor`].
pub struct BatchProcessor {
    processor: Arc<dyn ItemProcessor>,
}

impl BatchProcessor {
    pub fn new(processor: Arc<dyn ItemProcessor>) -> Self {
        Self { processor }
    }

    /// Run a batch under a generated batch id.
    pub async fn run(
        &self,
        items: Vec<IngestRequest>,
        pattern: &str,
        chunk_size: usize,
        worker_count: usize,
    ) -> IndexResult<BatchResult> {
        let batch_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(&batch_id, items, pattern, chunk_size, worker_count)
            .await
    }

    /// Run a batch under a caller-chosen batch id.
    ///
    /// Fails only when the arguments make the batch impossible to run; item
    /// failures are reported inside the returned [`BatchResult`].
    pub async fn run_with_id(
        &self,
        batch_id: &str,
        items: Vec<IngestRequest>,
        pattern: &str,
        chunk_size: usize,
        worker_count: usize,
    ) -> IndexResult<BatchResult> {
        if pattern.trim().is_empty() {
            return Err(IndexError::invalid_input("batch pattern name must not be empty"));
        }
        if chunk_size == 0 {
            return Err(IndexError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if worker_count == 0 {
            return Err(IndexError::Configuration(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if items.is_empty() {
            return Ok(BatchResult::empty(batch_id));
        }

        let start = Instant::now();
        let total = items.len();
        tracing::info!(
            "Starting batch {} of {} items (chunk_size={}, workers={})",
            batch_id,
            total,
            chunk_size,
            worker_count
        );

        let mut slots: Vec<Option<IndexResult<String>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        let semaphore = Arc::new(Semaphore::new(worker_count));
        let mut pending = items.into_iter().enumerate().peekable();

        while pending.peek().is_some() {
            let chunk: Vec<(usize, IngestRequest)> = pending.by_ref().take(chunk_size).collect();
            let chunk_len = chunk.len();
            let mut tasks = JoinSet::new();

            for (index, request) in chunk {
                let processor = self.processor.clone();
                let semaphore = semaphore.clone();
                let batch_id = batch_id.to_string();
                let pattern = pattern.to_string();

                tasks.spawn(async move {
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => AssertUnwindSafe(
                            processor.process_item(&batch_id, index, request, &pattern),
                        )
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(IndexError::Internal(panic_message(panic)))),
                        Err(e) => Err(IndexError::Internal(format!(
                            "worker pool closed: {}",
                            e
                        ))),
                    };
                    (index, outcome)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, outcome)) => slots[index] = Some(outcome),
                    // The slot stays empty and is reported below.
                    Err(e) => tracing::error!("Batch worker task failed: {}", e),
                }
            }
            tracing::debug!("Batch {} finished chunk of {} items", batch_id, chunk_len);
        }

        let outcomes: Vec<BatchItemOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some(Ok(doc_id)) => BatchItemOutcome::Success { index, doc_id },
                Some(Err(error)) => {
                    BatchItemOutcome::Failure(BatchItemError::new(index, pattern, error))
                }
                None => BatchItemOutcome::Failure(BatchItemError::new(
                    index,
                    pattern,
                    IndexError::Internal("worker did not report an outcome".to_string()),
                )),
            })
            .collect();

        let result = BatchResult {
            batch_id: batch_id.to_string(),
            outcomes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            "Batch {} complete: {} succeeded, {} failed, {}ms",
            batch_id,
            result.succeeded(),
            result.failed(),
            result.duration_ms
        );
        Ok(result)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("item processing panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBundle, TEXT_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the item text as its id; fails on empty bundles, panics on
    /// "boom", and tracks peak concurrency.
    #[derive(Default)]
    struct EchoProcessor {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ItemProcessor for EchoProcessor {
        async fn process_item(
            &self,
            _batch_id: &str,
            index: usize,
            request: IngestRequest,
            pattern: &str,
        ) -> IndexResult<String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Earlier items finish later.
            tokio::time::sleep(Duration::from_millis(5 * (10 - index.min(9)) as u64)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            match request.content.text_content() {
                Some("boom") => panic!("boom"),
                Some(text) => Ok(text.to_string()),
                None => Err(IndexError::missing_content(TEXT_KEY, pattern)),
            }
        }
    }

    fn items(texts: &[Option<&str>]) -> Vec<IngestRequest> {
        texts
            .iter()
            .map(|t| match t {
                Some(text) => IngestRequest::new(ContentBundle::text(*text)),
                None => IngestRequest::new(ContentBundle::new()),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let processor = BatchProcessor::new(Arc::new(EchoProcessor::default()));
        let result = processor
            .run(items(&[Some("a"), None, Some("c")]), "text", 100, 4)
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.document_ids(), vec![Some("a"), None, Some("c")]);
        let failure = result.errors().next().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.pattern, "text");
        assert!(matches!(failure.error, IndexError::Preprocessing { .. }));
    }

    #[tokio::test]
    async fn test_order_preserved_across_chunks() {
        let processor = BatchProcessor::new(Arc::new(EchoProcessor::default()));
        let texts: Vec<String> = (0..7).map(|i| format!("doc-{}", i)).collect();
        let input = texts
            .iter()
            .map(|t| IngestRequest::new(ContentBundle::text(t.clone())))
            .collect();

        let result = processor.run(input, "text", 3, 2).await.unwrap();
        let ids: Vec<&str> = result.document_ids().into_iter().flatten().collect();
        assert_eq!(ids, texts.iter().map(String::as_str).collect::<Vec<_>>());
        for (i, outcome) in result.outcomes.iter().enumerate() {
            assert_eq!(outcome.index(), i);
        }
    }

    #[tokio::test]
    async fn test_worker_count_bounds_concurrency() {
        let echo = Arc::new(EchoProcessor::default());
        let processor = BatchProcessor::new(echo.clone());
        let input = (0..8)
            .map(|i| IngestRequest::new(ContentBundle::text(format!("t{}", i))))
            .collect();

        let result = processor.run(input, "text", 8, 2).await.unwrap();
        assert!(result.is_complete_success());
        assert!(echo.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panic_is_contained_to_its_slot() {
        let processor = BatchProcessor::new(Arc::new(EchoProcessor::default()));
        let result = processor
            .run(items(&[Some("ok"), Some("boom"), Some("fine")]), "text", 10, 3)
            .await
            .unwrap();

        assert_eq!(result.succeeded(), 2);
        match result.outcomes[1].error() {
            Some(IndexError::Internal(message)) => assert!(message.contains("boom")),
            other => panic!("expected internal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_systemic_errors() {
        let processor = BatchProcessor::new(Arc::new(EchoProcessor::default()));
        assert!(matches!(
            processor.run(items(&[Some("a")]), "", 10, 1).await,
            Err(IndexError::InvalidInput { .. })
        ));
        assert!(matches!(
            processor.run(items(&[Some("a")]), "text", 0, 1).await,
            Err(IndexError::Configuration(_))
        ));
        assert!(matches!(
            processor.run(items(&[Some("a")]), "text", 10, 0).await,
            Err(IndexError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let processor = BatchProcessor::new(Arc::new(EchoProcessor::default()));
        let result = processor.run(Vec::new(), "text", 10, 2).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.success_rate(), 0.0);
    }
}
