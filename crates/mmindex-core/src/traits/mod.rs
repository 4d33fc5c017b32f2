//! Core traits for mmindex ports and capabilities.

mod capability;
mod embedder;
mod object_store;
mod vector_store;

pub use capability::*;
pub use embedder::*;
pub use object_store::*;
pub use vector_store::*;
