//! Persistent approximate nearest neighbor index over text-chunk embeddings.
//!
//! # Architecture
//! - [`codec`]: binary16 and int8 encodings used for on-disk vectors
//! - [`registry`]: caller identifiers <-> dense graph labels, with tombstones
//! - [`graph`]: the HNSW graph boundary
//! - [`storage`]: index directory layout and atomic persistence
//! - [`engine`]: the locked state machine tying the pieces together
//!
//! Vectors are L2-normalized before insertion, so inner-product distance
//! ranks results by cosine similarity.

pub mod codec;
mod engine;
pub mod graph;
mod registry;
pub mod storage;
mod types;

pub use engine::{DEFAULT_CAPACITY, VectorIndexEngine, l2_normalize};
pub use graph::{GraphError, HnswGraph};
pub use registry::IdRegistry;
pub use types::{
    ErrorKind, IndexStats, Label, Precision, SearchHit, VectorDimension, VectorError,
};
