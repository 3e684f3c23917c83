//! Container manifest: a JSON snapshot of the entry index.
//!
//! The manifest is a flat array of [`EntryInfo`] records. It is written
//! whole by [`crate::ContainerStore::snapshot_manifest`] and never updated
//! incrementally; the in-memory index is authoritative while a store is
//! open.

use crate::entry::{EntryId, EntryInfo};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Serialized form of an empty manifest.
pub const EMPTY_MANIFEST: &[u8] = b"[]";

/// Snapshot of the entry index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    /// Entry metadata, ordered by `(created_at, id)`.
    pub entries: Vec<EntryInfo>,
}

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manifest from index values in deterministic order.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = EntryInfo>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        sort_for_layout(&mut entries);
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the manifest to JSON bytes.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a manifest from JSON bytes.
    ///
    /// Empty input is treated as an empty manifest. Duplicate ids are
    /// rejected since the index could not represent them.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        let manifest: Self = serde_json::from_slice(data)?;

        let mut seen = HashSet::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            if !seen.insert(entry.id) {
                return Err(CoreError::invalid_format(format!(
                    "duplicate entry id in manifest: {}",
                    entry.id
                )));
            }
        }

        Ok(manifest)
    }

    /// Converts the manifest into an index map.
    #[must_use]
    pub fn into_index(self) -> HashMap<EntryId, EntryInfo> {
        self.entries.into_iter().map(|e| (e.id, e)).collect()
    }
}

/// Sorts entries into on-disk layout order: by `created_at`, then `id`.
pub(crate) fn sort_for_layout(entries: &mut [EntryInfo]) {
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Splits entries into a set whose byte ranges never overlap and the
/// entries that would overlap it.
///
/// Entries are swept in offset order; one that starts before the end of an
/// already kept entry is rejected. Zero-length entries only conflict when
/// they fall strictly inside another range.
pub(crate) fn partition_overlapping(
    mut entries: Vec<EntryInfo>,
) -> (Vec<EntryInfo>, Vec<EntryInfo>) {
    entries.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then(a.length.cmp(&b.length))
            .then(a.id.cmp(&b.id))
    });

    let mut kept = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    let mut reach = 0u64;
    for entry in entries {
        if entry.offset < reach {
            rejected.push(entry);
        } else {
            reach = reach.max(entry.end());
            kept.push(entry);
        }
    }
    (kept, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryType;

    fn entry(offset: u64, created_at: u64) -> EntryInfo {
        EntryInfo {
            id: EntryId::new(),
            offset,
            length: 4,
            created_at,
            entry_type: EntryType::SIGNED,
            checksum: Some(0xDEAD_BEEF),
        }
    }

    #[test]
    fn empty_manifest_encodes_as_empty_array() {
        assert_eq!(Manifest::new().encode().unwrap(), EMPTY_MANIFEST.to_vec());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let manifest = Manifest::from_entries(vec![entry(8, 2), entry(12, 1)]);
        let decoded = Manifest::decode(&manifest.encode().unwrap()).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn entries_ordered_by_creation_time() {
        let manifest = Manifest::from_entries(vec![entry(8, 30), entry(12, 10), entry(16, 20)]);
        let times: Vec<_> = manifest.entries.iter().map(|e| e.created_at).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(Manifest::decode(b"").unwrap().is_empty());
        assert!(Manifest::decode(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let e = entry(8, 1);
        let manifest = Manifest {
            entries: vec![e.clone(), e],
        };
        let result = Manifest::decode(&manifest.encode().unwrap());
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn malformed_json_rejected() {
        let result = Manifest::decode(b"{not json");
        assert!(matches!(result, Err(CoreError::Manifest(_))));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let (kept, rejected) = partition_overlapping(vec![entry(12, 2), entry(8, 1)]);
        assert_eq!(kept.len(), 2);
        assert!(rejected.is_empty());
    }

    #[test]
    fn overlapping_range_is_rejected() {
        let first = entry(8, 1);
        let clash = entry(10, 2);
        let (kept, rejected) = partition_overlapping(vec![clash.clone(), first.clone()]);
        assert_eq!(kept, vec![first]);
        assert_eq!(rejected, vec![clash]);
    }

    #[test]
    fn empty_entry_at_range_start_is_kept() {
        let mut empty = entry(8, 1);
        empty.length = 0;
        let (kept, rejected) = partition_overlapping(vec![entry(8, 2), empty]);
        assert_eq!(kept.len(), 2);
        assert!(rejected.is_empty());
    }

    #[test]
    fn into_index_keys_by_id() {
        let a = entry(8, 1);
        let id = a.id;
        let index = Manifest::from_entries(vec![a.clone()]).into_index();
        assert_eq!(index.get(&id), Some(&a));
    }
}
