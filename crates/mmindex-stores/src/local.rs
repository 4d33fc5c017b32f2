//! Local filesystem object store.
//!
//! Objects are written under a root directory at their key path and
//! addressed by `file://` URIs. URIs resolving outside the root are
//! rejected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use mmindex_core::error::{ErrorCode, IndexError, IndexResult, StoragePort};
use mmindex_core::traits::ObjectStore;

/// Slash-separated segments of safe characters.
static OBJECT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+(/[A-Za-z0-9_.-]+)*$").expect("valid object key regex")
});

/// Object store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

fn io_error(operation: &str, e: std::io::Error) -> IndexError {
    let code = match e.kind() {
        ErrorKind::NotFound => ErrorCode::StoNotFound,
        _ if operation == "get" => ErrorCode::StoReadFailed,
        _ => ErrorCode::StoWriteFailed,
    };
    IndexError::storage_with_source(StoragePort::ObjectStore, operation, code, e)
}

impl LocalObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> IndexResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| io_error("open", e))?;
        let root = root.canonicalize().map_err(|e| io_error("open", e))?;
        tracing::debug!("Local object store rooted at {}", root.display());
        Ok(Self { root })
    }

    /// Open a store under the platform data directory
    /// (for example `~/.local/share/mmindex/objects`).
    pub fn open_default() -> IndexResult<Self> {
        Self::new(Self::default_root()?)
    }

    /// Default root directory.
    pub fn default_root() -> IndexResult<PathBuf> {
        dirs::data_local_dir()
            .map(|dir| dir.join("mmindex").join("objects"))
            .ok_or_else(|| {
                IndexError::Configuration(
                    "no local data directory available; set an explicit object store root"
                        .to_string(),
                )
            })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_key(key: &str) -> IndexResult<()> {
        if !OBJECT_KEY.is_match(key) || key.split('/').any(|segment| segment == "..") {
            return Err(IndexError::object_store(
                "put",
                format!("invalid object key '{}'", key),
            ));
        }
        Ok(())
    }

    /// Resolve a `file://` URI to a path inside the root.
    fn resolve(&self, uri: &str, operation: &str) -> IndexResult<PathBuf> {
        let url = Url::parse(uri).map_err(|e| {
            IndexError::object_store(operation, format!("invalid URI '{}': {}", uri, e))
        })?;
        if url.scheme() != "file" {
            return Err(IndexError::object_store(
                operation,
                format!("unsupported URI scheme '{}'", url.scheme()),
            ));
        }
        let path = url.to_file_path().map_err(|_| {
            IndexError::object_store(operation, format!("'{}' is not a local file URI", uri))
        })?;

        let outside = path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
            || !path.starts_with(&self.root);
        if outside {
            return Err(IndexError::object_store(
                operation,
                format!("'{}' is outside the store root", uri),
            ));
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> IndexResult<String> {
        Self::validate_key(key)?;
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("put", e))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| io_error("put", e))?;

        let uri = Url::from_file_path(&path).map_err(|_| {
            IndexError::object_store("put", format!("cannot build URI for {}", path.display()))
        })?;
        tracing::debug!("Stored {} bytes ({}) at {}", bytes.len(), content_type, uri);
        Ok(uri.to_string())
    }

    async fn get(&self, uri: &str) -> IndexResult<Vec<u8>> {
        let path = self.resolve(uri, "get")?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => IndexError::not_found(StoragePort::ObjectStore, uri),
            _ => io_error("get", e),
        })
    }

    async fn delete(&self, uri: &str) -> IndexResult<()> {
        let path = self.resolve(uri, "delete")?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        let uri = store
            .put("images/doc-1.png", vec![9, 8, 7], "image/png")
            .await
            .unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.ends_with("images/doc-1.png"));
        assert_eq!(store.get(&uri).await.unwrap(), vec![9, 8, 7]);

        store.delete(&uri).await.unwrap();
        let err = store.get(&uri).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoNotFound);
        // Deleting twice is fine.
        store.delete(&uri).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        for key in ["", "../escape.txt", "a/../../b", "/abs/path", "spaces here.txt"] {
            assert!(store.put(key, vec![1], "text/plain").await.is_err(), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_rejects_uris_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        let outside = Url::from_file_path(other.path().join("secret.txt")).unwrap();
        assert!(store.get(outside.as_str()).await.is_err());
        assert!(store.get("mem://mm-index/images/a.png").await.is_err());
        assert!(store.get("not a uri").await.is_err());
    }
}
