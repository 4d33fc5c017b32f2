//! Factory for creating storage ports from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mmindex_core::error::IndexResult;
use mmindex_core::store::{InMemoryObjectStore, InMemoryVectorStore};
use mmindex_core::traits::{ObjectStore, VectorStore};

use crate::{LocalObjectStore, SqliteVectorStore};

/// Vector store provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreProvider {
    /// Process-local, non-persistent.
    #[default]
    Memory,
    /// SQLite file.
    Sqlite,
}

/// Object store provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreProvider {
    /// Process-local, non-persistent.
    #[default]
    Memory,
    /// Local filesystem directory.
    Local,
}

/// Vector store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub provider: VectorStoreProvider,
    /// Database file for `sqlite`; `:memory:` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Object store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub provider: ObjectStoreProvider,
    /// Root directory for `local`; the platform data directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Bucket name used in `mem://` URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// Both storage ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

/// Factory for creating storage ports.
pub struct StoreFactory;

impl StoreFactory {
    /// Create a vector store from the given configuration.
    pub fn vector_store(config: &VectorStoreConfig) -> IndexResult<Arc<dyn VectorStore>> {
        match config.provider {
            VectorStoreProvider::Memory => Ok(Arc::new(InMemoryVectorStore::new())),
            VectorStoreProvider::Sqlite => {
                let store = match &config.path {
                    Some(path) => SqliteVectorStore::new(path)?,
                    None => SqliteVectorStore::in_memory()?,
                };
                Ok(Arc::new(store))
            }
        }
    }

    /// Create an object store from the given configuration.
    pub fn object_store(config: &ObjectStoreConfig) -> IndexResult<Arc<dyn ObjectStore>> {
        match config.provider {
            ObjectStoreProvider::Memory => Ok(Arc::new(match &config.bucket {
                Some(bucket) => InMemoryObjectStore::with_bucket(bucket.clone()),
                None => InMemoryObjectStore::new(),
            })),
            ObjectStoreProvider::Local => {
                let store = match &config.root {
                    Some(root) => LocalObjectStore::new(root)?,
                    None => LocalObjectStore::open_default()?,
                };
                Ok(Arc::new(store))
            }
        }
    }

    /// Create both ports.
    pub fn create(
        config: &StoreConfig,
    ) -> IndexResult<(Arc<dyn VectorStore>, Arc<dyn ObjectStore>)> {
        Ok((
            Self::vector_store(&config.vector_store)?,
            Self::object_store(&config.object_store)?,
        ))
    }
}
