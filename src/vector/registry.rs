//! Bidirectional mapping between caller identifiers and graph labels.
//!
//! Labels are dense and monotonically increasing. A label whose identifier
//! was deleted, or superseded by an update, stays allocated as a tombstone:
//! its slot in the label table is emptied but never handed out again.
//!
//! # File format (`id_mapping.bin`, little endian)
//! ```text
//! [i32 precision tag][u64 entry count][u64 next label]
//! entry count x [u64 label][u64 id byte length][id bytes]
//! ```
//! A zero-length identifier marks a tombstoned or unused slot.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::vector::storage::{self, read_i32, read_u64};
use crate::vector::{Label, Precision, VectorError};

/// Identifier <-> label registry with tombstone tracking.
#[derive(Debug, Default, Clone)]
pub struct IdRegistry {
    id_to_label: HashMap<String, Label>,
    /// Indexed by label; `None` means tombstoned or never used.
    label_to_id: Vec<Option<String>>,
    next_label: u64,
}

impl IdRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the label for `id`, allocating a fresh one if `id` is unknown.
    ///
    /// Never overwrites an existing mapping. Callers that want to replace
    /// the vector behind a known identifier tombstone its label first.
    pub fn assign(&mut self, id: &str) -> Label {
        if let Some(&label) = self.id_to_label.get(id) {
            return label;
        }

        let label = Label::new(self.next_label);
        self.next_label = label.next().get();

        if label.index() >= self.label_to_id.len() {
            self.label_to_id.resize(label.index() + 1, None);
        }
        self.label_to_id[label.index()] = Some(id.to_string());
        self.id_to_label.insert(id.to_string(), label);
        label
    }

    /// Retires `label`: its identifier no longer resolves in either
    /// direction. Idempotent.
    pub fn tombstone(&mut self, label: Label) {
        if let Some(slot) = self.label_to_id.get_mut(label.index()) {
            if let Some(id) = slot.take() {
                self.id_to_label.remove(&id);
            }
        }
    }

    /// Looks up the live label of `id`.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<Label> {
        self.id_to_label.get(id).copied()
    }

    /// Resolves `label` to its identifier.
    ///
    /// `None` means the label is tombstoned or was never assigned; such
    /// labels must not appear in any result handed to callers.
    #[must_use]
    pub fn resolve(&self, label: Label) -> Option<&str> {
        self.label_to_id
            .get(label.index())
            .and_then(|slot| slot.as_deref())
    }

    /// Number of live identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_label.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_label.is_empty()
    }

    /// Size of the label table, live and tombstoned slots together.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.label_to_id.len()
    }

    /// The label the next [`IdRegistry::assign`] of a new id will return.
    #[must_use]
    pub fn next_label(&self) -> Label {
        Label::new(self.next_label)
    }

    /// Labels handed out that no longer resolve.
    #[must_use]
    pub fn tombstoned(&self) -> u64 {
        self.next_label.saturating_sub(self.id_to_label.len() as u64)
    }

    /// Iterates over every slot in label order.
    pub fn slots(&self) -> impl Iterator<Item = (Label, Option<&str>)> {
        self.label_to_id
            .iter()
            .enumerate()
            .map(|(index, slot)| (Label::new(index as u64), slot.as_deref()))
    }

    /// Writes the mapping file, replacing any previous one atomically.
    pub fn save(&self, path: &Path, precision: Precision) -> Result<(), VectorError> {
        storage::write_atomically(path, |writer| self.write_to(writer, precision))
            .map_err(|e| VectorError::io(path, e))
    }

    /// Serializes the mapping in the `id_mapping.bin` layout.
    pub fn write_to<W: Write>(&self, writer: &mut W, precision: Precision) -> std::io::Result<()> {
        writer.write_all(&precision.tag().to_le_bytes())?;
        writer.write_all(&(self.label_to_id.len() as u64).to_le_bytes())?;
        writer.write_all(&self.next_label.to_le_bytes())?;

        for (label, id) in self.slots() {
            let bytes = id.unwrap_or_default().as_bytes();
            writer.write_all(&label.get().to_le_bytes())?;
            writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
            writer.write_all(bytes)?;
        }
        Ok(())
    }

    /// Loads a mapping file written by [`IdRegistry::save`].
    ///
    /// All-or-nothing: any truncated or inconsistent record fails the load.
    pub fn load(path: &Path) -> Result<(Self, Precision), VectorError> {
        let mut reader = storage::open_reader(path)?;
        Self::read_from(&mut reader, path)
    }

    /// Deserializes a mapping; `source` only labels errors.
    pub fn read_from<R: Read>(
        reader: &mut R,
        source: &Path,
    ) -> Result<(Self, Precision), VectorError> {
        let decode = |e| storage::decode_error(source, e);

        let tag = read_i32(reader).map_err(decode)?;
        let precision = Precision::from_tag(tag).map_err(|_| {
            VectorError::corrupted(source, format!("unknown precision tag {tag}"))
        })?;
        let count = read_u64(reader).map_err(decode)?;
        let next_label = read_u64(reader).map_err(decode)?;

        if count > next_label {
            return Err(VectorError::corrupted(
                source,
                format!("{count} entries but next label is {next_label}"),
            ));
        }

        let count = usize::try_from(count)
            .map_err(|_| VectorError::corrupted(source, "entry count overflows usize"))?;

        // The header count is untrusted; the label table is only sized once
        // every record it promises has actually been read.
        let mut entries = Vec::new();
        for _ in 0..count {
            let label = Label::new(read_u64(reader).map_err(decode)?);
            let len = read_u64(reader).map_err(decode)?;

            let mut bytes = Vec::new();
            reader
                .by_ref()
                .take(len)
                .read_to_end(&mut bytes)
                .map_err(decode)?;
            if bytes.len() as u64 != len {
                return Err(VectorError::corrupted(
                    source,
                    format!("identifier for label {label} is truncated"),
                ));
            }

            if label.index() >= count {
                return Err(VectorError::corrupted(
                    source,
                    format!("label {label} outside table of {count} entries"),
                ));
            }
            if bytes.is_empty() {
                continue;
            }

            let id = String::from_utf8(bytes).map_err(|_| {
                VectorError::corrupted(source, format!("identifier for label {label} is not UTF-8"))
            })?;
            entries.push((label, id));
        }

        let mut registry = Self {
            id_to_label: HashMap::with_capacity(entries.len()),
            label_to_id: vec![None; count],
            next_label,
        };
        for (label, id) in entries {
            if registry.label_to_id[label.index()].is_some() {
                return Err(VectorError::corrupted(
                    source,
                    format!("label {label} appears twice"),
                ));
            }
            if registry.id_to_label.insert(id.clone(), label).is_some() {
                return Err(VectorError::corrupted(
                    source,
                    format!("identifier '{id}' mapped to more than one label"),
                ));
            }
            registry.label_to_id[label.index()] = Some(id);
        }

        Ok((registry, precision))
    }
}
