//! Approximate nearest neighbor graph boundary.
//!
//! Wraps the `hnsw` crate behind the small capability set the engine needs:
//! insert, soft delete, k-nearest-neighbor query, capacity growth and a
//! native save/load blob. Every call returns a typed [`GraphError`] instead
//! of panicking, so nothing from the graph library leaks into the engine API.
//!
//! The graph numbers its nodes by insertion order. Labels are mapped onto
//! those node indices here, which lets the engine keep its own label space
//! (with gaps left by tombstones) independent of how the graph was built.
//!
//! # Blob format (`index.bin`, little endian)
//! ```text
//! [b"SVGI"][u32 version][u32 dimension][u64 capacity][u64 node count]
//! node count x [u64 label][dimension x f32]
//! ```

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use hnsw::{Hnsw, Searcher};
use rand_pcg::Pcg64;
use space::Metric;
use thiserror::Error;

use crate::vector::Label;
use crate::vector::storage::{read_f32, read_u32, read_u64, write_atomically};

/// Links per node on upper layers.
const M: usize = 16;

/// Links per node on the ground layer.
const M0: usize = 32;

const BLOB_MAGIC: &[u8; 4] = b"SVGI";
const BLOB_VERSION: u32 = 1;

/// Errors raised at the graph boundary.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Label {label} exceeds graph capacity {capacity}")]
    CapacityExceeded { label: Label, capacity: u64 },

    #[error("Label {0} is already present in the graph")]
    DuplicateLabel(Label),

    #[error("Label {0} not found in the graph")]
    UnknownLabel(Label),

    #[error("Graph dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupted graph data: {reason}")]
    Corrupted { reason: String },

    #[error("Graph I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GraphError {
    fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }

    /// Maps read failures, treating a short read as corruption.
    fn from_read(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Self::corrupted("unexpected end of graph data")
        } else {
            Self::Io(error)
        }
    }
}

/// Inner-product distance on L2-normalized vectors: `1 - a.b`.
///
/// The graph library needs an unsigned, totally ordered unit. Non-negative
/// f32 values order the same way as their bit patterns, so the distance is
/// clamped at zero and stored as `f32::to_bits`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InnerProductDistance;

impl Metric<Vec<f32>> for InnerProductDistance {
    type Unit = u32;

    fn distance(&self, a: &Vec<f32>, b: &Vec<f32>) -> u32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        (1.0 - dot).max(0.0).to_bits()
    }
}

/// HNSW proximity graph keyed by [`Label`].
pub struct HnswGraph {
    hnsw: Hnsw<InnerProductDistance, Vec<f32>, Pcg64, M, M0>,
    searcher: Searcher<u32>,
    dimension: usize,
    capacity: u64,
    /// Graph node index -> label.
    node_labels: Vec<Label>,
    label_nodes: HashMap<Label, usize>,
    /// Soft-deleted node indices.
    deleted: HashSet<usize>,
}

impl std::fmt::Debug for HnswGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswGraph")
            .field("dimension", &self.dimension)
            .field("capacity", &self.capacity)
            .field("nodes", &self.node_labels.len())
            .field("deleted", &self.deleted.len())
            .finish()
    }
}

impl HnswGraph {
    /// Creates an empty graph with room for `capacity` labels.
    #[must_use]
    pub fn new(dimension: usize, capacity: u64) -> Self {
        Self {
            hnsw: Hnsw::new(InnerProductDistance),
            searcher: Searcher::default(),
            dimension,
            capacity,
            node_labels: Vec::new(),
            label_nodes: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    /// Current slot budget; labels must stay below it.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Nodes that are not soft-deleted.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.node_labels.len() - self.deleted.len()
    }

    /// Grows the slot budget. Requests below the current capacity are ignored.
    pub fn resize(&mut self, capacity: u64) {
        if capacity > self.capacity {
            let additional = usize::try_from(capacity - self.capacity).unwrap_or(0);
            self.node_labels.reserve(additional.min(1 << 20));
            self.capacity = capacity;
        }
    }

    /// Inserts `vector` under `label`.
    pub fn insert(&mut self, label: Label, vector: Vec<f32>) -> Result<(), GraphError> {
        if vector.len() != self.dimension {
            return Err(GraphError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if label.get() >= self.capacity {
            return Err(GraphError::CapacityExceeded {
                label,
                capacity: self.capacity,
            });
        }
        if self.label_nodes.contains_key(&label) {
            return Err(GraphError::DuplicateLabel(label));
        }

        let node = self.hnsw.insert(vector, &mut self.searcher);
        if node != self.node_labels.len() {
            return Err(GraphError::corrupted(format!(
                "graph assigned node {node}, expected {}",
                self.node_labels.len()
            )));
        }
        self.node_labels.push(label);
        self.label_nodes.insert(label, node);
        Ok(())
    }

    /// Soft-deletes `label`: it stays in the graph for routing but is never
    /// returned by [`HnswGraph::knn`] again. Idempotent.
    pub fn mark_deleted(&mut self, label: Label) -> Result<(), GraphError> {
        let node = self
            .label_nodes
            .get(&label)
            .copied()
            .ok_or(GraphError::UnknownLabel(label))?;
        self.deleted.insert(node);
        Ok(())
    }

    #[must_use]
    pub fn is_deleted(&self, label: Label) -> bool {
        self.label_nodes
            .get(&label)
            .is_some_and(|node| self.deleted.contains(node))
    }

    /// Returns the `min(k, live)` live labels closest to `query`, best first.
    ///
    /// Ranks every live node feature with the graph metric. `Hnsw::nearest`
    /// panics when it reaches fewer nodes than the output buffer holds, and
    /// that count is not known before the call, so it is not used here.
    pub fn knn(&self, query: &[f32], k: usize) -> Result<Vec<(Label, f32)>, GraphError> {
        if query.len() != self.dimension {
            return Err(GraphError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.live_count() == 0 {
            return Ok(Vec::new());
        }

        let query = query.to_vec();
        let mut hits: Vec<(Label, u32)> = self
            .node_labels
            .iter()
            .enumerate()
            .filter(|(node, _)| !self.deleted.contains(node))
            .map(|(node, label)| {
                let distance = InnerProductDistance.distance(&query, self.hnsw.feature(node));
                (*label, distance)
            })
            .collect();

        // Non-negative distances order like their bits; ties keep insertion order.
        hits.sort_by_key(|(_, distance)| *distance);
        hits.truncate(k);
        Ok(hits
            .into_iter()
            .map(|(label, distance)| (label, f32::from_bits(distance)))
            .collect())
    }

    /// The stored vector of a live label.
    #[must_use]
    pub fn vector(&self, label: Label) -> Option<&[f32]> {
        let node = *self.label_nodes.get(&label)?;
        if self.deleted.contains(&node) {
            return None;
        }
        Some(self.hnsw.feature(node).as_slice())
    }

    /// Writes the graph blob, skipping soft-deleted nodes.
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        write_atomically(path, |writer| self.write_to(writer))?;
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(BLOB_MAGIC)?;
        writer.write_all(&BLOB_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&self.capacity.to_le_bytes())?;
        writer.write_all(&(self.live_count() as u64).to_le_bytes())?;

        for (node, label) in self.node_labels.iter().enumerate() {
            if self.deleted.contains(&node) {
                continue;
            }
            writer.write_all(&label.get().to_le_bytes())?;
            for value in self.hnsw.feature(node) {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }

    /// Rebuilds a graph from a blob written by [`HnswGraph::save`].
    pub fn load(path: &Path, dimension: usize) -> Result<Self, GraphError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader, dimension)
    }

    fn read_from<R: Read>(reader: &mut R, dimension: usize) -> Result<Self, GraphError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(GraphError::from_read)?;
        if &magic != BLOB_MAGIC {
            return Err(GraphError::corrupted("invalid magic bytes"));
        }

        let version = read_u32(reader).map_err(GraphError::from_read)?;
        if version != BLOB_VERSION {
            return Err(GraphError::corrupted(format!(
                "unsupported blob version {version}"
            )));
        }

        let stored_dimension = read_u32(reader).map_err(GraphError::from_read)? as usize;
        if stored_dimension != dimension {
            return Err(GraphError::corrupted(format!(
                "blob holds {stored_dimension}-dimensional vectors, expected {dimension}"
            )));
        }

        let capacity = read_u64(reader).map_err(GraphError::from_read)?;
        let count = read_u64(reader).map_err(GraphError::from_read)?;
        if count > capacity {
            return Err(GraphError::corrupted(format!(
                "{count} nodes exceed capacity {capacity}"
            )));
        }

        let mut graph = Self::new(dimension, capacity);
        for _ in 0..count {
            let label = Label::new(read_u64(reader).map_err(GraphError::from_read)?);
            let mut vector = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                vector.push(read_f32(reader).map_err(GraphError::from_read)?);
            }
            graph.insert(label, vector).map_err(|e| match e {
                GraphError::CapacityExceeded { .. } | GraphError::DuplicateLabel(_) => {
                    GraphError::corrupted(e.to_string())
                }
                other => other,
            })?;
        }

        Ok(graph)
    }
}
