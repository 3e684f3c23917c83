//! Container compaction.
//!
//! Compaction rewrites the container so it holds exactly the indexed
//! payloads, in `(created_at, id)` order, directly after the magic.
//!
//! ## Invariants
//!
//! - Ids are preserved; only offsets move
//! - The live container is replaced by rename, never modified in place
//! - Compacting an already compacted container yields identical bytes
//! - Entries that cannot be read back are dropped from the new index

use super::files::{self, StagedFile};
use super::store::{ContainerStore, Index};
use crate::entry::EntryInfo;
use crate::error::CoreResult;
use crate::manifest::Manifest;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Suffix of the temporary file built during compaction.
const COMPACT_SUFFIX: &str = ".compact.tmp";

/// Result of a compaction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Number of indexed entries before compaction.
    pub entries_before: usize,
    /// Number of indexed entries after compaction.
    pub entries_after: usize,
    /// Entries dropped because their bytes could not be read back.
    pub entries_dropped: usize,
    /// Container size before compaction, preamble included.
    pub bytes_before: u64,
    /// Container size after compaction, preamble included.
    pub bytes_after: u64,
}

impl CompactionResult {
    /// Bytes reclaimed by the compaction.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

impl ContainerStore {
    /// Rewrites the container to hold only indexed payloads.
    ///
    /// Runs under the writer lock for its whole duration. The new file and
    /// its manifest are built next to the originals and synced; then both
    /// are renamed into place and the index is swapped in one publish step
    /// that completes even if this future is dropped. If the future is
    /// dropped or an error occurs before that step, the temporary files are
    /// removed and the container, manifest and index are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::NotInitialized`] before `ensure_created`,
    /// or an I/O error while building or publishing the new file. Entries
    /// that cannot be read are dropped, not reported as errors.
    pub async fn compact(&self) -> CoreResult<CompactionResult> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        self.check_ready()?;

        let container = &self.config.container_path;
        let entries = self.manifest_snapshot().entries;
        let bytes_before = files::file_len(container).await?;

        let staged = StagedFile::new(container, COMPACT_SUFFIX);
        let mut out = staged.create().await?;
        out.write_all(&self.config.magic).await?;

        let mut offset = self.preamble_len();
        let mut index = Index::with_capacity(entries.len());
        let mut dropped = 0usize;

        for entry in &entries {
            let payload = match self.read_payload(entry).await? {
                Ok(payload) => payload,
                Err(failure) => {
                    self.note_unreadable(entry, failure);
                    dropped += 1;
                    continue;
                }
            };

            out.write_all(&payload).await?;
            let length = payload.len() as u64;
            index.insert(
                entry.id,
                EntryInfo {
                    offset,
                    length,
                    checksum: Some(crc32fast::hash(&payload)),
                    ..entry.clone()
                },
            );
            offset += length;
        }

        out.flush().await?;
        out.sync_all().await?;
        drop(out);
        debug!(temp = %staged.path().display(), bytes = offset, "compacted container staged");

        let manifest = Manifest::from_entries(index.values().cloned());
        let staged_manifest = StagedFile::new(&self.config.manifest_path, COMPACT_SUFFIX);
        staged_manifest.write_all(&manifest.encode()?).await?;

        let result = CompactionResult {
            entries_before: entries.len(),
            entries_after: index.len(),
            entries_dropped: dropped,
            bytes_before,
            bytes_after: offset,
        };

        self.publish(writer, staged, staged_manifest, index).await?;
        self.stats.record_compaction();

        info!(
            path = %container.display(),
            entries = result.entries_after,
            dropped = result.entries_dropped,
            reclaimed = result.bytes_reclaimed(),
            "compaction complete"
        );
        Ok(result)
    }
}
