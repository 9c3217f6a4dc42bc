//! Vector index engine: the state machine over graph, registry and storage.
//!
//! One exclusive lock serializes every operation. The graph is never
//! queried while another call mutates it, and `close` persists under the
//! same lock before releasing the in-memory state.
//!
//! # Lifecycle
//! `create`/`open` return a ready engine. After [`VectorIndexEngine::close`]
//! every operation except another `close` fails with [`VectorError::Closed`].

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::vector::graph::HnswGraph;
use crate::vector::storage::{self, RestoredIndex};
use crate::vector::{IdRegistry, IndexStats, Precision, SearchHit, VectorDimension, VectorError};

/// Slot budget for a new index when none is given, and for an empty
/// compressed index on reopen.
pub const DEFAULT_CAPACITY: u64 = 100_000;

/// In-memory state of an open index.
#[derive(Debug)]
struct IndexCore {
    graph: HnswGraph,
    registry: IdRegistry,
    dirty: bool,
}

#[derive(Debug)]
enum EngineState {
    Ready(Box<IndexCore>),
    Closed,
}

/// Persistent HNSW index keyed by caller-supplied identifiers.
#[derive(Debug)]
pub struct VectorIndexEngine {
    dir: PathBuf,
    dimension: VectorDimension,
    precision: Precision,
    state: Mutex<EngineState>,
}

impl VectorIndexEngine {
    /// Creates an empty index rooted at `path`, creating the directory.
    ///
    /// Nothing is written until the first mutation is persisted by
    /// [`VectorIndexEngine::close`].
    pub fn create(
        path: impl AsRef<Path>,
        dimension: usize,
        capacity: u64,
        precision: Precision,
    ) -> Result<Self, VectorError> {
        let dir = path.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(VectorError::EmptyPath);
        }
        let dimension = VectorDimension::new(dimension)?;
        if capacity == 0 {
            return Err(VectorError::InvalidCapacity(capacity));
        }

        fs::create_dir_all(dir).map_err(|e| VectorError::io(dir, e))?;

        info!(
            "Created vector index at {} ({} dimensions, {}, capacity {capacity})",
            dir.display(),
            dimension.get(),
            precision.description()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            dimension,
            precision,
            state: Mutex::new(EngineState::Ready(Box::new(IndexCore {
                graph: HnswGraph::new(dimension.get(), capacity),
                registry: IdRegistry::new(),
                dirty: false,
            }))),
        })
    }

    /// Opens an existing index. The precision is read from the mapping file.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, VectorError> {
        let dir = path.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(VectorError::EmptyPath);
        }
        let dimension = VectorDimension::new(dimension)?;

        let RestoredIndex {
            registry,
            graph,
            precision,
        } = storage::restore(dir, dimension.get())?;

        info!(
            "Opened vector index at {} ({} live vectors, {})",
            dir.display(),
            registry.len(),
            precision.description()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            dimension,
            precision,
            state: Mutex::new(EngineState::Ready(Box::new(IndexCore {
                graph,
                registry,
                dirty: false,
            }))),
        })
    }

    /// Returns true when `path` holds a persisted index.
    #[must_use]
    pub fn exists(path: impl AsRef<Path>) -> bool {
        storage::mapping_path(path.as_ref()).exists()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Inserts or replaces the vector stored under `id`.
    ///
    /// Replacing never reuses the old label: it is tombstoned and the new
    /// vector gets a fresh one.
    pub fn add(&self, id: &str, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;

        let mut state = self.state.lock();
        let core = ready_mut(&mut state)?;

        if let Some(old) = core.registry.lookup(id) {
            core.graph.mark_deleted(old)?;
            core.registry.tombstone(old);
            debug!("Superseded label {old} of '{id}'");
        }

        let label = core.registry.next_label();
        let mut capacity = core.graph.capacity();
        while label.get() >= capacity {
            capacity = capacity.saturating_mul(2);
        }
        if capacity != core.graph.capacity() {
            debug!(
                "Growing vector index capacity {} -> {capacity}",
                core.graph.capacity()
            );
            core.graph.resize(capacity);
        }

        core.graph.insert(label, l2_normalize(vector))?;
        let assigned = core.registry.assign(id);
        debug_assert_eq!(assigned, label);
        core.dirty = true;
        Ok(())
    }

    /// Removes `id` from search results. Unknown identifiers are a no-op.
    pub fn delete(&self, id: &str) -> Result<(), VectorError> {
        let mut state = self.state.lock();
        let core = ready_mut(&mut state)?;

        let Some(label) = core.registry.lookup(id) else {
            return Ok(());
        };
        core.graph.mark_deleted(label)?;
        core.registry.tombstone(label);
        core.dirty = true;
        Ok(())
    }

    /// Returns up to `k` live identifiers most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorError> {
        self.dimension.validate_vector(query)?;
        if k == 0 {
            return Err(VectorError::InvalidK(k));
        }

        let state = self.state.lock();
        let core = ready(&state)?;

        let neighbors = core.graph.knn(&l2_normalize(query), k)?;

        // Soft deletes are lazy in the graph; only labels that still
        // resolve to an identifier are live.
        let mut hits: Vec<(f32, SearchHit)> = neighbors
            .into_iter()
            .filter_map(|(label, distance)| {
                core.registry.resolve(label).map(|id| {
                    (
                        distance,
                        SearchHit {
                            id: id.to_string(),
                            similarity: 1.0 - distance,
                        },
                    )
                })
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.truncate(k);

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    /// Persists pending changes and releases the index.
    ///
    /// In-memory state is released even when persisting fails; the error is
    /// still returned. Closing an already closed engine is a no-op.
    pub fn close(&self) -> Result<(), VectorError> {
        let mut state = self.state.lock();
        let EngineState::Ready(core) = std::mem::replace(&mut *state, EngineState::Closed) else {
            return Ok(());
        };

        if !core.dirty {
            debug!("Closing clean vector index at {}", self.dir.display());
            return Ok(());
        }

        storage::persist(&self.dir, self.precision, &core.registry, &core.graph)?;
        info!(
            "Saved vector index at {} ({} live vectors)",
            self.dir.display(),
            core.registry.len()
        );
        Ok(())
    }

    /// Snapshot of the index counters.
    pub fn stats(&self) -> Result<IndexStats, VectorError> {
        let state = self.state.lock();
        let core = ready(&state)?;
        Ok(IndexStats {
            dimension: self.dimension.get(),
            precision: self.precision,
            capacity: core.graph.capacity(),
            next_label: core.registry.next_label().get(),
            live: core.registry.len(),
            tombstoned: core.registry.tombstoned(),
            dirty: core.dirty,
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), EngineState::Closed)
    }

    /// Checks that the index is open and `query` matches its dimension,
    /// without searching.
    pub fn validate_query(&self, query: &[f32]) -> Result<(), VectorError> {
        ready(&self.state.lock())?;
        self.dimension.validate_vector(query)
    }
}

fn ready(state: &EngineState) -> Result<&IndexCore, VectorError> {
    match state {
        EngineState::Ready(core) => Ok(core.as_ref()),
        EngineState::Closed => Err(VectorError::Closed),
    }
}

fn ready_mut(state: &mut EngineState) -> Result<&mut IndexCore, VectorError> {
    match state {
        EngineState::Ready(core) => Ok(core.as_mut()),
        EngineState::Closed => Err(VectorError::Closed),
    }
}

/// Scales `vector` to unit length. A zero vector is returned unchanged.
#[must_use]
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter().map(|v| v / norm).collect()
    } else {
        vector.to_vec()
    }
}
