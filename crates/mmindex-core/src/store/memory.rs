//! In-memory vector and object stores for tests and embedded use.
//!
//! Both use `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force over all stored vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::rank_records;
use crate::error::{IndexError, IndexResult, StoragePort};
use crate::traits::{DistanceMetric, IndexInfo, ObjectStore, VectorStore};
use crate::types::{MetadataFilter, VectorMatch, VectorRecord};

const MEM_SCHEME: &str = "mem://";

#[derive(Debug, Clone)]
struct IndexState {
    name: String,
    dimension: usize,
    metric: DistanceMetric,
}

fn lock_error(port: StoragePort, e: impl std::fmt::Display) -> IndexError {
    IndexError::Storage {
        port,
        operation: "lock".to_string(),
        message: format!("Failed to acquire lock: {}", e),
        code: crate::error::ErrorCode::StoReadFailed,
        source: None,
    }
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    index: RwLock<Option<IndexState>>,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> IndexResult<IndexState> {
        self.index
            .read()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?
            .clone()
            .ok_or_else(|| IndexError::vector_store("access", "index has not been created"))
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> IndexResult<()> {
        let mut index = self
            .index
            .write()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?;

        match index.as_ref() {
            Some(existing) if existing.dimension != dimension || existing.metric != metric => {
                Err(IndexError::vector_store(
                    "create_index",
                    format!(
                        "index '{}' already exists with dimension {} and metric {}",
                        existing.name, existing.dimension, existing.metric
                    ),
                ))
            }
            Some(_) => Ok(()),
            None => {
                *index = Some(IndexState {
                    name: name.to_string(),
                    dimension,
                    metric,
                });
                tracing::debug!("Created in-memory index '{}' (dim {})", name, dimension);
                Ok(())
            }
        }
    }

    async fn put(&self, record: VectorRecord) -> IndexResult<()> {
        let state = self.state()?;
        if record.vector.len() != state.dimension {
            return Err(IndexError::vector_store(
                "put",
                format!(
                    "vector for '{}' has dimension {}, index '{}' expects {}",
                    record.id,
                    record.vector.len(),
                    state.name,
                    state.dimension
                ),
            ));
        }

        self.records
            .write()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> IndexResult<Option<VectorRecord>> {
        Ok(self
            .records
            .read()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?
            .get(id)
            .cloned())
    }

    async fn query(
        &self,
        vector: &[f32],
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<VectorMatch>> {
        let state = self.state()?;
        if vector.len() != state.dimension {
            return Err(IndexError::vector_store(
                "query",
                format!(
                    "query vector has dimension {}, index expects {}",
                    vector.len(),
                    state.dimension
                ),
            ));
        }

        let records = self
            .records
            .read()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?;
        Ok(rank_records(records.values(), vector, state.metric, filters, top_k))
    }

    async fn delete(&self, id: &str) -> IndexResult<bool> {
        Ok(self
            .records
            .write()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?
            .remove(id)
            .is_some())
    }

    async fn index_info(&self) -> IndexResult<Option<IndexInfo>> {
        let index = self
            .index
            .read()
            .map_err(|e| lock_error(StoragePort::VectorStore, e))?
            .clone();
        Ok(index.map(|state| IndexInfo {
            name: state.name,
            dimension: state.dimension,
            metric: state.metric,
            count: self.len(),
        }))
    }
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory object store handing out `mem://{bucket}/{key}` URIs.
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::with_bucket("mm-index")
    }

    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn key_for<'a>(&self, uri: &'a str) -> IndexResult<&'a str> {
        uri.strip_prefix(MEM_SCHEME)
            .and_then(|rest| rest.strip_prefix(self.bucket.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                IndexError::object_store("resolve", format!("'{}' is not a URI of this store", uri))
            })
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, uri: &str) -> Option<String> {
        let key = self.key_for(uri).ok()?;
        self.objects
            .read()
            .ok()?
            .get(key)
            .map(|o| o.content_type.clone())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> IndexResult<String> {
        if key.is_empty() {
            return Err(IndexError::object_store("put", "object key must not be empty"));
        }
        self.objects
            .write()
            .map_err(|e| lock_error(StoragePort::ObjectStore, e))?
            .insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        Ok(format!("{}{}/{}", MEM_SCHEME, self.bucket, key))
    }

    async fn get(&self, uri: &str) -> IndexResult<Vec<u8>> {
        let key = self.key_for(uri)?;
        self.objects
            .read()
            .map_err(|e| lock_error(StoragePort::ObjectStore, e))?
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| IndexError::not_found(StoragePort::ObjectStore, uri))
    }

    async fn delete(&self, uri: &str) -> IndexResult<()> {
        let key = self.key_for(uri)?;
        self.objects
            .write()
            .map_err(|e| lock_error(StoragePort::ObjectStore, e))?
            .remove(key);
        Ok(())
    }
}
