//! Contracts the rest of the application programs against.
//!
//! Ingestion workers and query handlers only see [`VectorIndex`]; the
//! concrete engine stays behind [`VectorIndexService`](crate::service::VectorIndexService).

use serde::Serialize;

use crate::error::SearchResult;

/// One semantic search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    /// Identifier of the matching chunk
    pub chunk_id: String,
    /// Cosine similarity to the query, about 1.0 for identical direction
    pub similarity: f64,
}

/// Vector similarity index shared across request threads.
pub trait VectorIndex: Send + Sync {
    /// Stores `embedding` under `chunk_id`, replacing any previous vector.
    fn add(&self, chunk_id: &str, embedding: &[f32]) -> SearchResult<()>;

    /// Removes `chunk_id`. Unknown identifiers succeed.
    fn delete(&self, chunk_id: &str) -> SearchResult<()>;

    /// The `k` chunks most similar to `query`, best first.
    fn search(&self, query: &[f32], k: usize) -> SearchResult<Vec<VectorHit>>;

    /// Flushes pending changes and releases the index.
    fn close(&self) -> SearchResult<()>;
}
