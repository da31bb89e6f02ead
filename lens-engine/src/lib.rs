//! The batched write queue, index schema, query compiler and engine facade
//! backing Lens search: indexing and retrieval over objects fetched from a
//! content-addressed store.

pub mod collaborators;
pub mod document;
pub mod engine;
pub mod error;
mod query;
mod queue;
mod result;
mod schema;
mod store;

pub use document::{Document, MetaData, Query, SearchResult};
pub use engine::{Engine, EngineConfig};
pub use error::{LensError, Result};
pub use queue::QueueConfig;
