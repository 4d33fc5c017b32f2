//! Core types for mmindex.

mod batch;
mod content;
mod record;

pub use batch::*;
pub use content::*;
pub use record::*;
