//! Service adapter between the application port and the vector engine.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::VectorIndexSettings;
use crate::error::SearchResult;
use crate::ports::{VectorHit, VectorIndex};
use crate::vector::{DEFAULT_CAPACITY, IndexStats, Precision, VectorIndexEngine};

/// [`VectorIndex`] backed by a [`VectorIndexEngine`].
///
/// Cheap to clone; clones share one engine and therefore one lock.
#[derive(Debug, Clone)]
pub struct VectorIndexService {
    engine: Arc<VectorIndexEngine>,
}

impl VectorIndexService {
    /// Wraps an engine that is already open.
    #[must_use]
    pub fn new(engine: Arc<VectorIndexEngine>) -> Self {
        Self { engine }
    }

    /// Creates a fresh index at `path`.
    pub fn create(
        path: impl AsRef<Path>,
        dimension: usize,
        capacity: u64,
        precision: Precision,
    ) -> SearchResult<Self> {
        let engine = VectorIndexEngine::create(path, dimension, capacity, precision)?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Opens the index persisted at `path`.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> SearchResult<Self> {
        let engine = VectorIndexEngine::open(path, dimension)?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Opens the index at `path`, creating it with the default capacity if
    /// nothing was persisted there yet.
    ///
    /// An existing index keeps the precision it was created with.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        dimension: usize,
        precision: Precision,
    ) -> SearchResult<Self> {
        Self::open_or_create_with_capacity(path, dimension, precision, DEFAULT_CAPACITY)
    }

    fn open_or_create_with_capacity(
        path: impl AsRef<Path>,
        dimension: usize,
        precision: Precision,
        capacity: u64,
    ) -> SearchResult<Self> {
        let path = path.as_ref();
        if !VectorIndexEngine::exists(path) {
            info!("No vector index at {}, creating one", path.display());
            return Self::create(path, dimension, capacity, precision);
        }

        let service = Self::open(path, dimension)?;
        let stored = service.engine.precision();
        if stored != precision {
            warn!(
                "Vector index at {} is stored as {stored}, ignoring requested {precision}",
                path.display()
            );
        }
        Ok(service)
    }

    /// Opens or creates the index described by `settings`.
    pub fn from_settings(settings: &VectorIndexSettings) -> SearchResult<Self> {
        settings.validate()?;
        Self::open_or_create_with_capacity(
            &settings.path,
            settings.dimensions,
            settings.precision,
            settings.initial_capacity,
        )
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<VectorIndexEngine> {
        &self.engine
    }

    pub fn stats(&self) -> SearchResult<IndexStats> {
        Ok(self.engine.stats()?)
    }
}

impl VectorIndex for VectorIndexService {
    fn add(&self, chunk_id: &str, embedding: &[f32]) -> SearchResult<()> {
        Ok(self.engine.add(chunk_id, embedding)?)
    }

    fn delete(&self, chunk_id: &str) -> SearchResult<()> {
        Ok(self.engine.delete(chunk_id)?)
    }

    fn search(&self, query: &[f32], k: usize) -> SearchResult<Vec<VectorHit>> {
        // A closed index or a malformed query fails even when nothing is asked for.
        self.engine.validate_query(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.engine.search(query, k)?;
        Ok(hits
            .into_iter()
            .map(|hit| VectorHit {
                chunk_id: hit.id,
                similarity: f64::from(hit.similarity),
            })
            .collect())
    }

    fn close(&self) -> SearchResult<()> {
        if let Err(e) = self.engine.close() {
            warn!(
                "Failed to persist vector index at {}: {e}",
                self.engine.path().display()
            );
        }
        Ok(())
    }
}
