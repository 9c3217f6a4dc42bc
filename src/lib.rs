//! Persistent HNSW vector index for semantic document search.
//!
//! Embeddings of text chunks are stored under caller-chosen identifiers and
//! queried by cosine similarity. Vectors can be persisted at full, half or
//! 8-bit precision.

pub mod config;
pub mod error;
pub mod exit_code;
pub mod logging;
pub mod ports;
pub mod service;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{LoggingConfig, Settings, VectorIndexSettings};
pub use error::{SearchError, SearchResult};
pub use exit_code::ExitCode;
pub use ports::{VectorHit, VectorIndex};
pub use service::VectorIndexService;
pub use vector::{IndexStats, Precision, SearchHit, VectorError, VectorIndexEngine};
