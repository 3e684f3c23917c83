//! Container store: the append-only file, its index and its manifest.

use super::files::{self, StagedFile};
use super::lock::ContainerLock;
use crate::config::{manifest_path_for, ContainerConfig};
use crate::entry::{EntryId, EntryInfo, EntryType};
use crate::error::{CoreError, CoreResult};
use crate::manifest::{partition_overlapping, Manifest, EMPTY_MANIFEST};
use crate::stats::{StatsSnapshot, StoreStats};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, ErrorKind, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// In-memory index: entry id -> metadata.
pub(crate) type Index = HashMap<EntryId, EntryInfo>;

/// State owned by whoever holds the writer mutex.
#[derive(Debug, Default)]
pub(super) struct WriterState {
    /// Cross-process lock, held from the first `ensure_created` onward.
    lock: Option<ContainerLock>,
}

/// Why an indexed entry could not be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// The container file does not exist.
    FileMissing,
    /// Fewer bytes were available than the index records.
    Truncated,
    /// The bytes do not match the recorded CRC32.
    ChecksumMismatch,
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileMissing => f.write_str("container file missing"),
            Self::Truncated => f.write_str("payload truncated"),
            Self::ChecksumMismatch => f.write_str("payload checksum mismatch"),
        }
    }
}

/// Result of [`ContainerStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of indexed entries checked.
    pub checked: usize,
    /// Sum of the lengths of readable entries.
    pub live_bytes: u64,
    /// Container file size, preamble included.
    pub file_size: u64,
    /// Entries that could not be read back, with the reason.
    pub unreadable: Vec<(EntryId, ReadFailure)>,
    /// Pairs of entries whose byte ranges overlap.
    pub overlapping: Vec<(EntryId, EntryId)>,
}

impl VerifyReport {
    /// Returns true if every entry is readable and no ranges overlap.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.unreadable.is_empty() && self.overlapping.is_empty()
    }
}

/// Append-only container of opaque payloads.
///
/// The store owns one container file (`[magic][payload][payload]...`), a
/// sidecar JSON manifest, and the in-memory index that makes the file
/// interpretable. The file carries no framing: offsets and lengths live
/// only in the index.
///
/// # Lifecycle
///
/// A new store is Uninitialized. [`ContainerStore::ensure_created`] creates
/// missing files, loads the manifest and moves it to Ready. Every other
/// I/O operation on an Uninitialized store fails with
/// [`CoreError::NotInitialized`].
///
/// # Concurrency
///
/// Appends, compaction, snapshots, eviction, export and import serialize on
/// one async mutex per store. Reads take no writer lock and open a fresh
/// file handle per call. Compaction and import publish a new file and index
/// inside a generation window; a read that overlaps the window retries, so
/// it observes either the old state or the new one.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> recall_core::CoreResult<()> {
/// use recall_core::{ContainerConfig, ContainerStore, EntryType, now_millis};
///
/// let store = ContainerStore::open(ContainerConfig::new("memories.bin")).await?;
/// let id = store.append_entry(b"payload", now_millis(), EntryType::PLAIN).await?;
/// assert_eq!(store.read_entry_raw(id).await?, Some(b"payload".to_vec()));
/// store.snapshot_manifest().await?;
/// # Ok(())
/// # }
/// ```
pub struct ContainerStore {
    pub(super) config: ContainerConfig,
    pub(super) index: Arc<RwLock<Index>>,
    pub(super) writer: Arc<Mutex<WriterState>>,
    pub(super) ready: AtomicBool,
    /// Odd while a new file and index are being published.
    pub(super) generation: Arc<AtomicU64>,
    pub(super) stats: Arc<StoreStats>,
}

impl ContainerStore {
    /// Creates an Uninitialized store. No I/O is performed.
    #[must_use]
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            index: Arc::new(RwLock::new(HashMap::new())),
            writer: Arc::new(Mutex::new(WriterState::default())),
            ready: AtomicBool::new(false),
            generation: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(StoreStats::new()),
        }
    }

    /// Creates a store and brings it to Ready.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`Self::ensure_created`].
    pub async fn open(config: ContainerConfig) -> CoreResult<Self> {
        let store = Self::new(config);
        store.ensure_created().await?;
        Ok(store)
    }

    /// Creates the container and manifest if missing and loads the index.
    ///
    /// Safe to call on every start. The first successful call acquires the
    /// container's writer lock, checks the magic preamble and loads the
    /// manifest; later calls only recreate files that have gone missing.
    ///
    /// Manifest entries that point outside the container are discarded and
    /// counted as corruptions.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Io`] if the files cannot be created or read
    /// - [`CoreError::ContainerLocked`] if another handle owns the container
    /// - [`CoreError::InvalidFormat`] if the preamble does not match
    /// - [`CoreError::Manifest`] if the manifest is not valid JSON
    pub async fn ensure_created(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock().await;

        let first_open = writer.lock.is_none();
        if first_open {
            let lock = ContainerLock::acquire(&self.config.container_path).await?;
            debug!(lock = %lock.path().display(), "acquired container lock");
            writer.lock = Some(lock);
        }

        let result = self.create_missing_files().await;
        let result = match result {
            Ok(()) if !self.is_ready() => self.load_index().await,
            other => other,
        };

        if let Err(e) = result {
            if first_open {
                writer.lock = None;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn create_missing_files(&self) -> CoreResult<()> {
        let container = &self.config.container_path;
        if !fs::try_exists(container).await? {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(container)
                .await?;
            file.write_all(&self.config.magic).await?;
            file.flush().await?;
            file.sync_all().await?;
            files::sync_parent_dir(container).await?;
            info!(path = %container.display(), "created container");
        }

        let manifest = &self.config.manifest_path;
        if !fs::try_exists(manifest).await? {
            files::write_atomic(manifest, EMPTY_MANIFEST).await?;
            debug!(path = %manifest.display(), "created empty manifest");
        }
        Ok(())
    }

    async fn load_index(&self) -> CoreResult<()> {
        let container = &self.config.container_path;
        let preamble = files::read_preamble(container, self.config.magic.len()).await?;
        if preamble != self.config.magic {
            return Err(CoreError::invalid_format(format!(
                "{} does not start with the expected magic",
                container.display()
            )));
        }

        let data = fs::read(&self.config.manifest_path).await?;
        let manifest = Manifest::decode(&data)?;
        let file_size = files::file_len(container).await?;
        let floor = self.preamble_len();

        let mut in_bounds = Vec::with_capacity(manifest.len());
        for entry in manifest.entries {
            if entry.offset < floor || entry.end() > file_size {
                warn!(
                    id = %entry.id,
                    offset = entry.offset,
                    length = entry.length,
                    file_size,
                    "manifest entry outside container, dropping"
                );
                self.stats.record_corruption();
                continue;
            }
            in_bounds.push(entry);
        }

        let (kept, overlapping) = partition_overlapping(in_bounds);
        for entry in &overlapping {
            warn!(
                id = %entry.id,
                offset = entry.offset,
                length = entry.length,
                "manifest entry overlaps another, dropping"
            );
            self.stats.record_corruption();
        }
        let index: Index = kept.into_iter().map(|e| (e.id, e)).collect();

        let count = index.len();
        *self.index.write() = index;
        self.ready.store(true, Ordering::Release);
        info!(path = %container.display(), entries = count, "container store ready");
        Ok(())
    }

    /// Appends `payload` and returns its new id.
    ///
    /// The write is flushed (and synced when `sync_on_append` is set)
    /// before the entry is indexed. The write and the index insert run on a
    /// blocking thread that holds the writer lock, so once started they
    /// finish even if this future is dropped. A failed append never leaves
    /// an index entry behind; the file may keep unreferenced bytes from a
    /// partial write, which compaction drops.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error if the write fails.
    pub async fn append_entry(
        &self,
        payload: &[u8],
        created_at: u64,
        entry_type: EntryType,
    ) -> CoreResult<EntryId> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        self.check_ready()?;

        let path = self.config.container_path.clone();
        let sync = self.config.sync_on_append;
        let payload = payload.to_vec();
        let index = Arc::clone(&self.index);
        let stats = Arc::clone(&self.stats);

        let task = tokio::task::spawn_blocking(move || -> CoreResult<EntryInfo> {
            let _writer = writer;

            let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
            let offset = file.metadata()?.len();
            file.write_all(&payload)?;
            file.flush()?;
            if sync {
                file.sync_data()?;
            }
            drop(file);

            let info = EntryInfo {
                id: fresh_id(&index.read()),
                offset,
                length: payload.len() as u64,
                created_at,
                entry_type,
                checksum: Some(crc32fast::hash(&payload)),
            };
            index.write().insert(info.id, info.clone());
            stats.record_append(info.length);
            Ok(info)
        });
        let info = task.await.map_err(join_error)??;

        debug!(
            id = %info.id,
            offset = info.offset,
            length = info.length,
            %entry_type,
            "appended entry"
        );
        Ok(info.id)
    }

    /// Reads the payload of `id`.
    ///
    /// Returns `Ok(None)` for ids that are not indexed, and also for
    /// indexed entries whose bytes are no longer fully present or fail
    /// their checksum. The latter case is logged and counted in
    /// [`StatsSnapshot::corruptions`]; it never yields a short payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error other than a short read.
    pub async fn read_entry_raw(&self, id: EntryId) -> CoreResult<Option<Vec<u8>>> {
        self.check_ready()?;

        loop {
            let generation = self.generation.load(Ordering::Acquire);
            if generation % 2 == 1 {
                tokio::task::yield_now().await;
                continue;
            }

            let info = self.index.read().get(&id).cloned();
            let read = match &info {
                Some(info) => Some(self.read_payload(info).await?),
                None => None,
            };

            if self.generation.load(Ordering::Acquire) != generation {
                continue;
            }

            return Ok(match (info, read) {
                (Some(_), Some(Ok(bytes))) => {
                    self.stats.record_read(bytes.len() as u64);
                    Some(bytes)
                }
                (Some(info), Some(Err(failure))) => {
                    self.note_unreadable(&info, failure);
                    None
                }
                _ => {
                    self.stats.record_miss();
                    None
                }
            });
        }
    }

    /// Reads the bytes recorded by `info` through a per-call handle.
    pub(super) async fn read_payload(
        &self,
        info: &EntryInfo,
    ) -> CoreResult<Result<Vec<u8>, ReadFailure>> {
        let mut file = match File::open(&self.config.container_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Err(ReadFailure::FileMissing)),
            Err(e) => return Err(e.into()),
        };

        let len = usize::try_from(info.length).map_err(|_| {
            CoreError::invalid_format(format!("entry {} length {} too large", info.id, info.length))
        })?;

        file.seek(SeekFrom::Start(info.offset)).await?;
        let mut buf = vec![0u8; len];
        match file.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(Err(ReadFailure::Truncated)),
            Err(e) => return Err(e.into()),
        }

        if self.config.verify_checksums {
            if let Some(expected) = info.checksum {
                if crc32fast::hash(&buf) != expected {
                    return Ok(Err(ReadFailure::ChecksumMismatch));
                }
            }
        }

        Ok(Ok(buf))
    }

    pub(super) fn note_unreadable(&self, info: &EntryInfo, failure: ReadFailure) {
        warn!(
            id = %info.id,
            offset = info.offset,
            length = info.length,
            %failure,
            "container and index diverged"
        );
        self.stats.record_corruption();
    }

    /// Returns a copy of all indexed entry metadata in layout order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`.
    pub fn list_indexed_entries(&self) -> CoreResult<Vec<EntryInfo>> {
        self.check_ready()?;
        Ok(Manifest::from_entries(self.index.read().values().cloned()).entries)
    }

    /// Returns the metadata for `id`, if indexed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`.
    pub fn entry_info(&self, id: EntryId) -> CoreResult<Option<EntryInfo>> {
        self.check_ready()?;
        Ok(self.index.read().get(&id).cloned())
    }

    /// Writes the whole index to the manifest file, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error if the manifest cannot be written.
    pub async fn snapshot_manifest(&self) -> CoreResult<()> {
        let _writer = self.writer.lock().await;
        self.check_ready()?;

        let manifest = self.manifest_snapshot();
        files::write_atomic(&self.config.manifest_path, &manifest.encode()?).await?;
        self.stats.record_snapshot();

        info!(
            path = %self.config.manifest_path.display(),
            entries = manifest.len(),
            "manifest snapshot written"
        );
        Ok(())
    }

    /// Removes `id` from the index. Its bytes stay in the file until the
    /// next compaction.
    ///
    /// Returns whether the id was indexed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`.
    pub async fn evict_entry(&self, id: EntryId) -> CoreResult<bool> {
        let _writer = self.writer.lock().await;
        self.check_ready()?;

        let removed = self.index.write().remove(&id).is_some();
        if removed {
            debug!(%id, "evicted entry");
        }
        Ok(removed)
    }

    /// Copies the container to `destination` and writes the current index
    /// next to it as `destination` + `.manifest.json`.
    ///
    /// Holds the writer lock, so no append interleaves with the copy. Both
    /// files are staged and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error if either copy fails.
    pub async fn export_to(&self, destination: impl AsRef<Path>) -> CoreResult<()> {
        let destination = destination.as_ref();
        let _writer = self.writer.lock().await;
        self.check_ready()?;

        let manifest = self.manifest_snapshot();
        let manifest_dest = manifest_path_for(destination);

        let staged_container = StagedFile::new(destination, ".export.tmp");
        let bytes = staged_container
            .copy_from(&self.config.container_path)
            .await?;
        let staged_manifest = StagedFile::new(&manifest_dest, ".export.tmp");
        staged_manifest.write_all(&manifest.encode()?).await?;

        staged_container.commit().await?;
        staged_manifest.commit().await?;

        info!(
            destination = %destination.display(),
            entries = manifest.len(),
            bytes,
            "exported container"
        );
        Ok(())
    }

    /// Replaces the container, manifest and index with the pair at `source`
    /// and `source` + `.manifest.json`.
    ///
    /// This is a wholesale replace: entries indexed before the import that
    /// are absent from the imported manifest become unreachable. The source
    /// is fully validated before anything is replaced.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotInitialized`] before `ensure_created`
    /// - [`CoreError::InvalidFormat`] if the source preamble differs or a
    ///   manifest entry points outside the source container
    /// - [`CoreError::Manifest`] if the source manifest is malformed
    /// - [`CoreError::Io`] if a file cannot be read or replaced
    pub async fn import_from(&self, source: impl AsRef<Path>) -> CoreResult<()> {
        let source = source.as_ref();
        let writer = Arc::clone(&self.writer).lock_owned().await;
        self.check_ready()?;

        let manifest_bytes = fs::read(manifest_path_for(source)).await?;
        let manifest = Manifest::decode(&manifest_bytes)?;

        let preamble = files::read_preamble(source, self.config.magic.len()).await?;
        if preamble != self.config.magic {
            return Err(CoreError::invalid_format(format!(
                "{} does not start with the expected magic",
                source.display()
            )));
        }

        let source_len = files::file_len(source).await?;
        let floor = self.preamble_len();
        if let Some(bad) = manifest
            .entries
            .iter()
            .find(|e| e.offset < floor || e.end() > source_len)
        {
            return Err(CoreError::invalid_format(format!(
                "imported entry {} spans {}..{} outside {} bytes",
                bad.id,
                bad.offset,
                bad.end(),
                source_len
            )));
        }
        let (_, overlapping) = partition_overlapping(manifest.entries.clone());
        if let Some(bad) = overlapping.first() {
            return Err(CoreError::invalid_format(format!(
                "imported entry {} at {} overlaps another entry",
                bad.id, bad.offset
            )));
        }

        let staged_container = StagedFile::new(&self.config.container_path, ".import.tmp");
        staged_container.copy_from(source).await?;
        let staged_manifest = StagedFile::new(&self.config.manifest_path, ".import.tmp");
        staged_manifest.write_all(&manifest_bytes).await?;

        let count = manifest.len();
        self.publish(writer, staged_container, staged_manifest, manifest.into_index())
            .await?;

        info!(source = %source.display(), entries = count, "imported container");
        Ok(())
    }

    /// Reads every indexed entry and reports unreadable or overlapping ones.
    ///
    /// Holds the writer lock so the report reflects one consistent state.
    /// Nothing is modified.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error other than a short read.
    pub async fn verify(&self) -> CoreResult<VerifyReport> {
        let _writer = self.writer.lock().await;
        self.check_ready()?;

        let entries = self.manifest_snapshot().entries;
        let mut report = VerifyReport {
            checked: entries.len(),
            file_size: files::file_len(&self.config.container_path).await?,
            ..VerifyReport::default()
        };

        let mut by_offset = entries.clone();
        by_offset.sort_by_key(|e| e.offset);
        for pair in by_offset.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                report.overlapping.push((pair[0].id, pair[1].id));
            }
        }

        for entry in &entries {
            match self.read_payload(entry).await? {
                Ok(bytes) => report.live_bytes += bytes.len() as u64,
                Err(failure) => report.unreadable.push((entry.id, failure)),
            }
        }

        debug!(
            checked = report.checked,
            unreadable = report.unreadable.len(),
            overlapping = report.overlapping.len(),
            "verified container"
        );
        Ok(report)
    }

    /// Current container file size, preamble included.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] before `ensure_created`, or an
    /// I/O error if the file cannot be inspected.
    pub async fn file_size(&self) -> CoreResult<u64> {
        self.check_ready()?;
        files::file_len(&self.config.container_path).await
    }

    /// Returns true once `ensure_created` has succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Number of indexed entries (zero before initialization).
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Returns true if no entries are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Returns true if `id` is indexed.
    pub fn contains(&self, id: EntryId) -> bool {
        self.index.read().contains_key(&id)
    }

    /// Returns a snapshot of the store counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Path of the container file.
    pub fn container_path(&self) -> &Path {
        &self.config.container_path
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> &Path {
        &self.config.manifest_path
    }

    /// Store configuration.
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub(super) fn check_ready(&self) -> CoreResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotInitialized)
        }
    }

    pub(super) fn preamble_len(&self) -> u64 {
        self.config.magic.len() as u64
    }

    pub(super) fn manifest_snapshot(&self) -> Manifest {
        Manifest::from_entries(self.index.read().values().cloned())
    }

    /// Installs a rebuilt container, its manifest and the matching index.
    ///
    /// Both files must already be staged and synced. The renames and the
    /// index swap run on a blocking thread that owns the writer guard, so
    /// dropping the calling future cannot separate them; readers see the
    /// whole step as one generation window. A failed directory sync after
    /// the renames is logged, not returned, since the new state is already
    /// live.
    pub(super) async fn publish(
        &self,
        writer: OwnedMutexGuard<WriterState>,
        container: StagedFile,
        manifest: StagedFile,
        index: Index,
    ) -> CoreResult<()> {
        let container = container.into_pending();
        let manifest = manifest.into_pending();
        let shared = Arc::clone(&self.index);
        let generation = Arc::clone(&self.generation);

        let task = tokio::task::spawn_blocking(move || -> CoreResult<()> {
            let _writer = writer;
            let container_path = container.target().to_path_buf();
            let manifest_path = manifest.target().to_path_buf();

            {
                let _publish = PublishGuard::begin(&generation);
                container.apply()?;
                *shared.write() = index;
            }
            if let Err(e) = manifest.apply() {
                warn!(
                    path = %manifest_path.display(),
                    error = %e,
                    "container published but manifest rename failed"
                );
                return Err(e.into());
            }

            let mut dirs = vec![container_path.as_path()];
            if manifest_path.parent() != container_path.parent() {
                dirs.push(manifest_path.as_path());
            }
            for path in dirs {
                if let Err(e) = files::sync_parent_dir_blocking(path) {
                    warn!(path = %path.display(), error = %e, "directory sync after publish failed");
                }
            }
            Ok(())
        });
        task.await.map_err(join_error)?
    }
}

fn fresh_id(index: &Index) -> EntryId {
    loop {
        let id = EntryId::new();
        if !index.contains_key(&id) {
            return id;
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> CoreError {
    CoreError::Io(io::Error::new(io::ErrorKind::Other, e))
}

impl fmt::Debug for ContainerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerStore")
            .field("container_path", &self.config.container_path)
            .field("ready", &self.is_ready())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

/// Marks a publish window: the generation is odd while the guard lives.
struct PublishGuard<'a>(&'a AtomicU64);

impl<'a> PublishGuard<'a> {
    fn begin(generation: &'a AtomicU64) -> Self {
        generation.fetch_add(1, Ordering::AcqRel);
        Self(generation)
    }
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Release);
    }
}
