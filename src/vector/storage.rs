//! Persistence of an index directory.
//!
//! An index directory always holds `id_mapping.bin` (see
//! [`IdRegistry`](crate::vector::IdRegistry)) plus one vector file whose
//! format depends on the precision recorded in the mapping:
//!
//! - `index.bin` for [`Precision::Float32`]: the graph's own blob
//! - `vectors.f16` for [`Precision::Float16`]
//! - `vectors.i8` for [`Precision::Int8`]
//!
//! # Compressed vector files (little endian)
//! ```text
//! [u32 vector count][u32 dimension]
//! f16: vector count x [dimension x u16]
//! i8:  vector count x [f32 scale][dimension x i8]
//! ```
//! Records are label-indexed. Tombstoned labels are written as zero
//! records and skipped on load.
//!
//! Every file is replaced atomically: written to a sibling `.tmp` file,
//! flushed and synced, then renamed over the target.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::vector::codec::{decode_f16, dequantize_i8, encode_f16, quantize_i8};
use crate::vector::engine::DEFAULT_CAPACITY;
use crate::vector::graph::{GraphError, HnswGraph};
use crate::vector::{IdRegistry, Label, Precision, VectorError};

/// Identifier mapping file name.
pub const MAPPING_FILE: &str = "id_mapping.bin";

/// Size of the compressed vector file header.
const COMPRESSED_HEADER_SIZE: usize = 8;

/// Path of the identifier mapping inside `dir`.
#[must_use]
pub fn mapping_path(dir: &Path) -> PathBuf {
    dir.join(MAPPING_FILE)
}

/// Path of the vector file for `precision` inside `dir`.
#[must_use]
pub fn vector_path(dir: &Path, precision: Precision) -> PathBuf {
    dir.join(precision.file_name())
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_f32<R: Read>(reader: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Maps a read failure on `path`; a short read means the file is truncated.
pub(crate) fn decode_error(path: &Path, error: io::Error) -> VectorError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        VectorError::corrupted(path, "unexpected end of file")
    } else {
        VectorError::io(path, error)
    }
}

/// Opens `path` for buffered reading. A missing file is [`VectorError::MissingFile`].
pub(crate) fn open_reader(path: &Path) -> Result<BufReader<File>, VectorError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(VectorError::MissingFile {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(VectorError::io(path, e)),
    }
}

/// Writes `path` through a temporary sibling file and renames it into place.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    match write_synced(&tmp, write) {
        Ok(()) => fs::rename(&tmp, path),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn write_synced<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Persists the registry and the vectors of `graph` into `dir`.
///
/// The mapping is written even if the vector file fails and vice versa;
/// the first error is returned.
pub fn persist(
    dir: &Path,
    precision: Precision,
    registry: &IdRegistry,
    graph: &HnswGraph,
) -> Result<(), VectorError> {
    let mapping = registry.save(&mapping_path(dir), precision);
    let vectors = save_vectors(dir, precision, registry, graph);

    debug!(
        "Persisted {} labels ({} live) to {} as {precision}",
        registry.slot_count(),
        registry.len(),
        dir.display()
    );
    mapping.and(vectors)
}

/// Writes only the precision-specific vector file.
pub fn save_vectors(
    dir: &Path,
    precision: Precision,
    registry: &IdRegistry,
    graph: &HnswGraph,
) -> Result<(), VectorError> {
    let path = vector_path(dir, precision);
    match precision {
        Precision::Float32 => graph.save(&path).map_err(|e| graph_error(&path, e)),
        Precision::Float16 | Precision::Int8 => {
            write_atomically(&path, |writer| {
                write_compressed(writer, precision, registry, graph)
            })
            .map_err(|e| VectorError::io(&path, e))
        }
    }
}

fn write_compressed<W: Write>(
    writer: &mut W,
    precision: Precision,
    registry: &IdRegistry,
    graph: &HnswGraph,
) -> io::Result<()> {
    let count = u32::try_from(registry.slot_count()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "label count does not fit the vector file header",
        )
    })?;
    let dimension = graph.dimension();

    let mut header = [0u8; COMPRESSED_HEADER_SIZE];
    header[..4].copy_from_slice(&count.to_le_bytes());
    header[4..].copy_from_slice(&(dimension as u32).to_le_bytes());
    writer.write_all(&header)?;

    for (label, id) in registry.slots() {
        let vector = id.and_then(|_| graph.vector(label));
        match precision {
            Precision::Float16 => match vector {
                Some(vector) => {
                    for half in encode_f16(vector) {
                        writer.write_all(&half.to_le_bytes())?;
                    }
                }
                None => writer.write_all(&vec![0u8; dimension * 2])?,
            },
            Precision::Int8 => match vector {
                Some(vector) => {
                    let (quantized, scale) = quantize_i8(vector);
                    writer.write_all(&scale.to_le_bytes())?;
                    let bytes: Vec<u8> = quantized.iter().map(|q| *q as u8).collect();
                    writer.write_all(&bytes)?;
                }
                None => {
                    writer.write_all(&0.0f32.to_le_bytes())?;
                    writer.write_all(&vec![0u8; dimension])?;
                }
            },
            Precision::Float32 => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "float32 vectors are stored in the graph blob",
                ));
            }
        }
    }
    Ok(())
}

/// Everything reconstructed from an index directory.
#[derive(Debug)]
pub struct RestoredIndex {
    pub registry: IdRegistry,
    pub graph: HnswGraph,
    pub precision: Precision,
}

/// Loads the mapping and vector file in `dir` and rebuilds the graph.
///
/// All-or-nothing: a missing, truncated or inconsistent file fails the
/// whole load.
pub fn restore(dir: &Path, dimension: usize) -> Result<RestoredIndex, VectorError> {
    let (registry, precision) = IdRegistry::load(&mapping_path(dir))?;
    let path = vector_path(dir, precision);

    let graph = match precision {
        Precision::Float32 => load_graph_blob(&path, dimension, &registry)?,
        Precision::Float16 | Precision::Int8 => {
            let mut reader = open_reader(&path)?;
            read_compressed(&mut reader, &path, precision, dimension, &registry)?
        }
    };

    debug!(
        "Restored {} live vectors from {} ({precision})",
        graph.live_count(),
        dir.display()
    );
    Ok(RestoredIndex {
        registry,
        graph,
        precision,
    })
}

fn load_graph_blob(
    path: &Path,
    dimension: usize,
    registry: &IdRegistry,
) -> Result<HnswGraph, VectorError> {
    if !path.exists() {
        return Err(VectorError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let graph = HnswGraph::load(path, dimension).map_err(|e| graph_error(path, e))?;

    for (label, id) in registry.slots() {
        if id.is_some() && graph.vector(label).is_none() {
            return Err(VectorError::corrupted(
                path,
                format!("live label {label} has no vector"),
            ));
        }
    }
    if graph.capacity() < registry.slot_count() as u64 {
        return Err(VectorError::corrupted(
            path,
            format!(
                "capacity {} below {} assigned labels",
                graph.capacity(),
                registry.slot_count()
            ),
        ));
    }
    Ok(graph)
}

/// Rebuilds a graph from a compressed vector file.
///
/// Vectors were normalized before they were stored, so they are inserted
/// as decoded.
pub(crate) fn read_compressed<R: Read>(
    reader: &mut R,
    path: &Path,
    precision: Precision,
    dimension: usize,
    registry: &IdRegistry,
) -> Result<HnswGraph, VectorError> {
    let decode = |e| decode_error(path, e);

    let count = read_u32(reader).map_err(decode)? as usize;
    let stored_dimension = read_u32(reader).map_err(decode)? as usize;
    if stored_dimension != dimension {
        return Err(VectorError::corrupted(
            path,
            format!("file holds {stored_dimension}-dimensional vectors, expected {dimension}"),
        ));
    }
    if count != registry.slot_count() {
        return Err(VectorError::corrupted(
            path,
            format!(
                "{count} vector records for {} assigned labels",
                registry.slot_count()
            ),
        ));
    }

    let capacity = if count == 0 {
        DEFAULT_CAPACITY
    } else {
        count as u64
    };
    let mut graph = HnswGraph::new(dimension, capacity);

    let record_size = precision.bytes_per_vector(dimension);
    let mut record = vec![0u8; record_size];
    for index in 0..count {
        reader.read_exact(&mut record).map_err(decode)?;

        let label = Label::new(index as u64);
        if registry.resolve(label).is_none() {
            continue;
        }

        let vector = match precision {
            Precision::Float16 => {
                let halves: Vec<u16> = record
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                decode_f16(&halves)
            }
            Precision::Int8 => {
                let scale = f32::from_le_bytes([record[0], record[1], record[2], record[3]]);
                let quantized: Vec<i8> = record[4..].iter().map(|b| *b as i8).collect();
                dequantize_i8(&quantized, scale)
            }
            Precision::Float32 => {
                return Err(VectorError::corrupted(
                    path,
                    "float32 vectors are stored in the graph blob",
                ));
            }
        };

        graph
            .insert(label, vector)
            .map_err(|e| graph_error(path, e))?;
    }

    Ok(graph)
}

/// Attaches `path` to graph I/O and corruption failures.
fn graph_error(path: &Path, error: GraphError) -> VectorError {
    match error {
        GraphError::Io(e) => VectorError::io(path, e),
        GraphError::Corrupted { reason } => VectorError::corrupted(path, reason),
        other => VectorError::Graph(other),
    }
}
