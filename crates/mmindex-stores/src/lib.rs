//! mmindex-stores - Storage port implementations for mmindex.
//!
//! # Backends
//!
//! - [`SqliteVectorStore`] - embedded vector store on a SQLite file
//! - [`LocalObjectStore`] - object store on a local directory (`file://` URIs)
//!
//! In-memory stores live in `mmindex_core::store`; [`StoreFactory`] builds
//! any of them from a [`StoreConfig`].

mod factory;
mod local;
mod sqlite;

pub use factory::{
    ObjectStoreConfig, ObjectStoreProvider, StoreConfig, StoreFactory, VectorStoreConfig,
    VectorStoreProvider,
};
pub use local::LocalObjectStore;
pub use sqlite::SqliteVectorStore;
