//! Type-safe wrappers and core types for the vector index.
//!
//! This module provides newtypes and error types following the project's
//! strict type safety guidelines. Labels, dimensions and precision modes
//! are never passed around as bare integers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::graph::GraphError;

/// Dense internal identifier of a vector inside the ANN graph.
///
/// Labels are handed out in increasing order and never reused, even after
/// the identifier that owned them is deleted or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u64);

impl Label {
    /// Creates a label from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Position of this label in label-indexed tables.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// The label that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent dimension
/// mismatches during insert and query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero or does not fit the
    /// 32-bit header fields of the on-disk format.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        if u32::try_from(dim).is_err() {
            return Err(VectorError::InvalidDimension {
                dimension: dim,
                reason: "Vector dimension must fit in 32 bits",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// On-disk representation of stored vectors.
///
/// Runtime math always happens in full precision; this only decides what
/// gets written when the index is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 4 bytes per dimension, persisted through the graph's own blob.
    Float32,
    /// 2 bytes per dimension (IEEE-754 binary16).
    #[default]
    Float16,
    /// 1 byte per dimension plus a 4-byte per-vector scale.
    Int8,
}

impl Precision {
    /// All precision modes, in tag order.
    pub const ALL: [Precision; 3] = [Precision::Float32, Precision::Float16, Precision::Int8];

    /// Tag stored at the head of `id_mapping.bin`.
    #[must_use]
    pub const fn tag(&self) -> i32 {
        match self {
            Self::Float32 => 0,
            Self::Float16 => 1,
            Self::Int8 => 2,
        }
    }

    /// Inverse of [`Precision::tag`].
    pub fn from_tag(tag: i32) -> Result<Self, VectorError> {
        match tag {
            0 => Ok(Self::Float32),
            1 => Ok(Self::Float16),
            2 => Ok(Self::Int8),
            other => Err(VectorError::UnknownPrecision(other.to_string())),
        }
    }

    /// Canonical lowercase name used in configuration files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float16 => "float16",
            Self::Int8 => "int8",
        }
    }

    /// Human-readable description of the storage trade-off.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Float32 => "Float32 (full precision, no compression)",
            Self::Float16 => "Float16 (half precision, 50% savings)",
            Self::Int8 => "Int8 (8-bit quantized, 75% savings)",
        }
    }

    /// Bytes one stored vector occupies on disk.
    #[must_use]
    pub const fn bytes_per_vector(&self, dimension: usize) -> usize {
        match self {
            Self::Float32 => dimension * 4,
            Self::Float16 => dimension * 2,
            Self::Int8 => 4 + dimension,
        }
    }

    /// File holding the persisted vectors for this precision.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Float32 => "index.bin",
            Self::Float16 => "vectors.f16",
            Self::Int8 => "vectors.i8",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(Self::Float32),
            "float16" | "f16" => Ok(Self::Float16),
            "int8" | "i8" => Ok(Self::Int8),
            _ => Err(VectorError::UnknownPrecision(s.to_string())),
        }
    }
}

/// A single search result: the caller's identifier and its similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// `1 - distance`; about 1.0 for identical directions, 0.0 for orthogonal.
    pub similarity: f32,
}

/// Snapshot of an open index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub precision: Precision,
    pub capacity: u64,
    pub next_label: u64,
    /// Identifiers currently searchable.
    pub live: usize,
    /// Labels that were deleted or superseded by an update.
    pub tombstoned: u64,
    pub dirty: bool,
}

/// Coarse classification of [`VectorError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; fails fast without side effects.
    Validation,
    /// A file could not be created, read or written.
    Io,
    /// Persisted data is truncated or malformed.
    Corruption,
    /// The index has already been closed.
    Closed,
    /// The ANN graph rejected an operation.
    Internal,
}

/// Errors that can occur during vector index operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Index path cannot be empty\nSuggestion: Configure a directory for the vector index")]
    EmptyPath,

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid capacity: {0}\nSuggestion: Initial capacity must be at least 1")]
    InvalidCapacity(u64),

    #[error("Invalid result count k = {0}\nSuggestion: Request at least one result")]
    InvalidK(usize),

    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index is closed\nSuggestion: Open the index again before using it")]
    Closed,

    #[error(
        "Required index file not found: {path:?}\nSuggestion: Create the index first or check the configured path"
    )]
    MissingFile { path: PathBuf },

    #[error("Storage error at {path:?}: {source}\nSuggestion: Check disk space and file permissions")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Corrupted index file {path:?}: {reason}\nSuggestion: Delete the index directory and re-index your sources"
    )]
    Corrupted { path: PathBuf, reason: String },

    #[error("Unknown precision '{0}'\nSuggestion: Use one of float32, float16 or int8")]
    UnknownPrecision(String),

    #[error("ANN graph error: {0}")]
    Graph(#[from] GraphError),
}

impl VectorError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a corruption error for `path`.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classifies the error for callers that map it into their own domain.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPath
            | Self::InvalidDimension { .. }
            | Self::InvalidCapacity(_)
            | Self::InvalidK(_)
            | Self::DimensionMismatch { .. }
            | Self::UnknownPrecision(_) => ErrorKind::Validation,
            Self::Closed => ErrorKind::Closed,
            Self::MissingFile { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Corrupted { .. } => ErrorKind::Corruption,
            Self::Graph(GraphError::Corrupted { .. }) => ErrorKind::Corruption,
            Self::Graph(GraphError::Io(_)) => ErrorKind::Io,
            Self::Graph(GraphError::DimensionMismatch { .. }) => ErrorKind::Validation,
            Self::Graph(_) => ErrorKind::Internal,
        }
    }
}
