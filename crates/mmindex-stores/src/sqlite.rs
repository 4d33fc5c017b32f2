//! SQLite vector store.
//!
//! An embedded store on a single SQLite file (or `:memory:`). Each index is
//! a plain table `vectors_<name>` of `(id, embedding, metadata)` rows, named
//! after the index verbatim so distinct names never share a table.
//! Embeddings are stored as little-endian `f32` blobs and metadata as JSON
//! text. Queries scan the table and score every row, so filtered `top_k`
//! results are exact.
//!
//! # Example
//!
//! ```ignore
//! use mmindex_stores::SqliteVectorStore;
//!
//! let store = SqliteVectorStore::new("vectors.db")?;
//! store.create_index("mm-index", 384, DistanceMetric::Cosine).await?;
//! ```

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use zerocopy::IntoBytes;

use mmindex_core::error::{ErrorCode, IndexError, IndexResult, StoragePort};
use mmindex_core::store::rank_records;
use mmindex_core::traits::{DistanceMetric, IndexInfo, VectorStore};
use mmindex_core::types::{Metadata, MetadataFilter, VectorMatch, VectorRecord};

/// Index names become table names, so they are restricted.
static INDEX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,62}$").expect("valid index name regex"));

const CATALOG_TABLE: &str = "mmindex_indexes";

#[derive(Debug, Clone)]
struct IndexState {
    name: String,
    table: String,
    dimension: usize,
    metric: DistanceMetric,
}

/// SQLite-backed vector store.
pub struct SqliteVectorStore {
    /// SQLite connection (wrapped in Mutex for Send + Sync).
    conn: Mutex<Connection>,
    index: Mutex<Option<IndexState>>,
}

fn sqlite_error(operation: &str, code: ErrorCode, e: rusqlite::Error) -> IndexError {
    IndexError::storage_with_source(StoragePort::VectorStore, operation, code, e)
}

fn lock_error(e: impl std::fmt::Display) -> IndexError {
    IndexError::vector_store("lock", format!("Failed to acquire lock: {}", e))
}

impl SqliteVectorStore {
    /// Open (or create) a database file. Use `":memory:"` for a private
    /// in-memory database.
    pub fn new(db_path: impl AsRef<Path>) -> IndexResult<Self> {
        let conn = Connection::open(db_path.as_ref())
            .map_err(|e| sqlite_error("open", ErrorCode::StoConnectionFailed, e))?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    name TEXT PRIMARY KEY,
                    dimension INTEGER NOT NULL,
                    metric TEXT NOT NULL
                )",
                CATALOG_TABLE
            ),
            [],
        )
        .map_err(|e| sqlite_error("open", ErrorCode::StoConnectionFailed, e))?;

        tracing::debug!("Opened SQLite vector store at {}", db_path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
            index: Mutex::new(None),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> IndexResult<Self> {
        Self::new(":memory:")
    }

    fn state(&self) -> IndexResult<IndexState> {
        self.index
            .lock()
            .map_err(lock_error)?
            .clone()
            .ok_or_else(|| IndexError::vector_store("access", "index has not been created"))
    }

    fn check_dimension(state: &IndexState, operation: &str, len: usize) -> IndexResult<()> {
        if len != state.dimension {
            return Err(IndexError::vector_store(
                operation,
                format!(
                    "vector has dimension {}, index '{}' expects {}",
                    len, state.name, state.dimension
                ),
            ));
        }
        Ok(())
    }

    /// Convert bytes back to Vec<f32>.
    fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn decode_row(id: String, embedding: Vec<u8>, metadata: String) -> IndexResult<VectorRecord> {
        let metadata: Metadata = serde_json::from_str(&metadata)?;
        Ok(VectorRecord::new(id, Self::bytes_to_vector(&embedding), metadata))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_index(
        &self,
        name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> IndexResult<()> {
        if !INDEX_NAME.is_match(name) {
            return Err(IndexError::vector_store(
                "create_index",
                format!(
                    "index name '{}' must start with a letter and contain only letters, digits, '_' or '-'",
                    name
                ),
            ));
        }

        let conn = self.conn.lock().map_err(lock_error)?;

        let existing: Option<(i64, String)> = conn
            .query_row(
                &format!("SELECT dimension, metric FROM {} WHERE name = ?", CATALOG_TABLE),
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| sqlite_error("create_index", ErrorCode::StoReadFailed, e))?;

        match existing {
            Some((stored_dim, stored_metric)) => {
                let stored_metric: DistanceMetric = stored_metric.parse().map_err(|_| {
                    IndexError::vector_store(
                        "create_index",
                        format!("index '{}' has unknown metric '{}'", name, stored_metric),
                    )
                })?;
                if stored_dim as usize != dimension || stored_metric != metric {
                    return Err(IndexError::vector_store(
                        "create_index",
                        format!(
                            "index '{}' already exists with dimension {} and metric {}",
                            name, stored_dim, stored_metric
                        ),
                    ));
                }
            }
            None => {
                conn.execute(
                    &format!(
                        "INSERT INTO {} (name, dimension, metric) VALUES (?, ?, ?)",
                        CATALOG_TABLE
                    ),
                    params![name, dimension as i64, metric.to_string()],
                )
                .map_err(|e| sqlite_error("create_index", ErrorCode::StoWriteFailed, e))?;
            }
        }

        let table = format!("vectors_{}", name);
        conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (
                    id TEXT PRIMARY KEY,
                    embedding BLOB NOT NULL,
                    metadata TEXT NOT NULL
                )"#,
                table
            ),
            [],
        )
        .map_err(|e| sqlite_error("create_index", ErrorCode::StoWriteFailed, e))?;

        *self.index.lock().map_err(lock_error)? = Some(IndexState {
            name: name.to_string(),
            table,
            dimension,
            metric,
        });

        tracing::info!("Opened index '{}' with dimension {}", name, dimension);
        Ok(())
    }

    async fn put(&self, record: VectorRecord) -> IndexResult<()> {
        let state = self.state()?;
        Self::check_dimension(&state, "put", record.vector.len())?;

        let metadata = serde_json::to_string(&record.metadata)?;
        let conn = self.conn.lock().map_err(lock_error)?;
        conn.execute(
            &format!(
                r#"INSERT OR REPLACE INTO "{}" (id, embedding, metadata) VALUES (?, ?, ?)"#,
                state.table
            ),
            params![record.id, record.vector.as_bytes(), metadata],
        )
        .map_err(|e| sqlite_error("put", ErrorCode::StoWriteFailed, e))?;

        tracing::trace!("Stored '{}' in index '{}'", record.id, state.name);
        Ok(())
    }

    async fn get(&self, id: &str) -> IndexResult<Option<VectorRecord>> {
        let state = self.state()?;
        let conn = self.conn.lock().map_err(lock_error)?;

        let row: Option<(String, Vec<u8>, String)> = conn
            .query_row(
                &format!(
                    r#"SELECT id, embedding, metadata FROM "{}" WHERE id = ?"#,
                    state.table
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|e| sqlite_error("get", ErrorCode::StoReadFailed, e))?;

        row.map(|(id, embedding, metadata)| Self::decode_row(id, embedding, metadata))
            .transpose()
    }

    async fn query(
        &self,
        vector: &[f32],
        filters: Option<&MetadataFilter>,
        top_k: usize,
    ) -> IndexResult<Vec<VectorMatch>> {
        let state = self.state()?;
        Self::check_dimension(&state, "query", vector.len())?;

        let records = {
            let conn = self.conn.lock().map_err(lock_error)?;
            let mut stmt = conn
                .prepare(&format!(
                    r#"SELECT id, embedding, metadata FROM "{}""#,
                    state.table
                ))
                .map_err(|e| sqlite_error("query", ErrorCode::StoReadFailed, e))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| sqlite_error("query", ErrorCode::StoReadFailed, e))?;

            let mut records = Vec::new();
            for row in rows {
                let (id, embedding, metadata) =
                    row.map_err(|e| sqlite_error("query", ErrorCode::StoReadFailed, e))?;
                records.push(Self::decode_row(id, embedding, metadata)?);
            }
            records
        };

        Ok(rank_records(&records, vector, state.metric, filters, top_k))
    }

    async fn delete(&self, id: &str) -> IndexResult<bool> {
        let state = self.state()?;
        let conn = self.conn.lock().map_err(lock_error)?;
        let removed = conn
            .execute(
                &format!(r#"DELETE FROM "{}" WHERE id = ?"#, state.table),
                params![id],
            )
            .map_err(|e| sqlite_error("delete", ErrorCode::StoWriteFailed, e))?;
        Ok(removed > 0)
    }

    async fn index_info(&self) -> IndexResult<Option<IndexInfo>> {
        let Some(state) = self.index.lock().map_err(lock_error)?.clone() else {
            return Ok(None);
        };

        let conn = self.conn.lock().map_err(lock_error)?;
        let count: i64 = conn
            .query_row(
                &format!(r#"SELECT COUNT(*) FROM "{}""#, state.table),
                [],
                |row| row.get(0),
            )
            .map_err(|e| sqlite_error("index_info", ErrorCode::StoReadFailed, e))?;

        Ok(Some(IndexInfo {
            name: state.name,
            dimension: state.dimension,
            metric: state.metric,
            count: count as usize,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn create_test_store() -> SqliteVectorStore {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .create_index("test-index", 4, DistanceMetric::Cosine)
            .await
            .unwrap();
        store
    }

    fn create_test_vector(id: &str, values: [f32; 4], category: &str) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert("data".to_string(), json!(format!("data for {}", id)));
        metadata.insert("category".to_string(), json!(category));
        VectorRecord::new(id, values.to_vec(), metadata)
    }

    #[tokio::test]
    async fn test_put_and_query() {
        let store = create_test_store().await;
        store.put(create_test_vector("1", [1.0, 0.0, 0.0, 0.0], "a")).await.unwrap();
        store.put(create_test_vector("2", [0.9, 0.1, 0.0, 0.0], "a")).await.unwrap();
        store.put(create_test_vector("3", [0.0, 1.0, 0.0, 0.0], "b")).await.unwrap();

        let results = store.query(&[1.0, 0.0, 0.0, 0.0], None, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "1");
        assert_eq!(results[1].id, "2");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_query_with_filter() {
        let store = create_test_store().await;
        for i in 0..5 {
            let category = if i % 2 == 0 { "even" } else { "odd" };
            store
                .put(create_test_vector(&format!("r{}", i), [i as f32, 1.0, 0.0, 0.0], category))
                .await
                .unwrap();
        }

        let mut filter = MetadataFilter::new();
        filter.insert("category".into(), json!("even"));
        let results = store.query(&[1.0, 1.0, 0.0, 0.0], Some(&filter), 10).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.metadata["category"] == "even"));
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let store = create_test_store().await;
        store
            .put(create_test_vector("test-id", [1.0, 2.0, 3.0, 4.0], "a"))
            .await
            .unwrap();

        let retrieved = store.get("test-id").await.unwrap().unwrap();
        assert_eq!(retrieved.vector, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(retrieved.metadata["category"], "a");

        assert!(store.delete("test-id").await.unwrap());
        assert!(store.get("test-id").await.unwrap().is_none());
        assert!(!store.delete("test-id").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_dimension_mismatch() {
        let store = create_test_store().await;
        let record = VectorRecord::new("bad", vec![1.0; 5], Metadata::new());
        assert!(store.put(record).await.is_err());
        assert!(store.query(&[1.0; 3], None, 1).await.is_err());
        assert_eq!(store.index_info().await.unwrap().unwrap().count, 0);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_index_name() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let err = store
            .create_index("x\"; DROP TABLE y", 4, DistanceMetric::Cosine)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("index name"));
    }

    #[tokio::test]
    async fn test_reopen_checks_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store.create_index("cars", 4, DistanceMetric::Euclidean).await.unwrap();
            store.put(create_test_vector("c1", [1.0, 0.0, 0.0, 0.0], "a")).await.unwrap();
        }

        let store = SqliteVectorStore::new(&path).unwrap();
        assert!(store.create_index("cars", 8, DistanceMetric::Euclidean).await.is_err());
        store.create_index("cars", 4, DistanceMetric::Euclidean).await.unwrap();

        let info = store.index_info().await.unwrap().unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(info.metric, DistanceMetric::Euclidean);
        assert_eq!(store.dimension().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_dash_and_underscore_names_stay_separate() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.create_index("a-b", 4, DistanceMetric::Cosine).await.unwrap();
        store.put(create_test_vector("x", [1.0, 0.0, 0.0, 0.0], "a")).await.unwrap();

        store.create_index("a_b", 2, DistanceMetric::Cosine).await.unwrap();
        let info = store.index_info().await.unwrap().unwrap();
        assert_eq!(info.count, 0);
        store
            .put(VectorRecord::new("y", vec![0.0, 1.0], Metadata::new()))
            .await
            .unwrap();
        assert!(store.get("x").await.unwrap().is_none());

        store.create_index("a-b", 4, DistanceMetric::Cosine).await.unwrap();
        let info = store.index_info().await.unwrap().unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(store.get("x").await.unwrap().unwrap().vector.len(), 4);
        assert!(store.get("y").await.unwrap().is_none());
    }
}
