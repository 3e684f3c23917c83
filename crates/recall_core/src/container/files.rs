//! Atomic file replacement helpers.
//!
//! Every file the store replaces (container on compaction and import,
//! manifest on snapshot, export destinations) goes through the same
//! sequence:
//! 1. Write the new content to a sibling temporary file
//! 2. Sync the temporary file to disk
//! 3. Rename it over the target
//! 4. Fsync the parent directory so the rename is durable
//!
//! A [`StagedFile`] that is dropped before [`StagedFile::commit`] removes
//! its temporary file, so a failed or cancelled operation never leaves the
//! target half-written.

use crate::error::{CoreError, CoreResult};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A temporary sibling of `target` that replaces it on commit.
#[derive(Debug)]
pub(crate) struct StagedFile {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Reserves a temporary path next to `target` using `suffix`.
    pub(crate) fn new(target: &Path, suffix: &str) -> Self {
        let mut name = OsString::from(target.as_os_str());
        name.push(suffix);
        Self {
            temp_path: PathBuf::from(name),
            target: target.to_path_buf(),
            committed: false,
        }
    }

    /// Path of the temporary file.
    pub(crate) fn path(&self) -> &Path {
        &self.temp_path
    }

    /// Creates (or truncates) the temporary file for writing.
    pub(crate) async fn create(&self) -> CoreResult<File> {
        Ok(File::create(&self.temp_path).await?)
    }

    /// Writes `data` to the temporary file and syncs it.
    pub(crate) async fn write_all(&self, data: &[u8]) -> CoreResult<()> {
        let mut file = self.create().await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Copies `source` into the temporary file and syncs it.
    pub(crate) async fn copy_from(&self, source: &Path) -> CoreResult<u64> {
        let copied = fs::copy(source, &self.temp_path).await?;
        File::open(&self.temp_path).await?.sync_all().await?;
        Ok(copied)
    }

    /// Hands the synced temporary file over for a blocking rename.
    pub(crate) fn into_pending(mut self) -> PendingRename {
        self.committed = true;
        PendingRename {
            temp_path: std::mem::take(&mut self.temp_path),
            target: std::mem::take(&mut self.target),
            applied: false,
        }
    }

    /// Atomically renames the temporary file over the target.
    pub(crate) async fn commit(mut self) -> CoreResult<()> {
        fs::rename(&self.temp_path, &self.target).await?;
        self.committed = true;
        sync_parent_dir(&self.target).await
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// A staged file awaiting its rename on a blocking thread.
///
/// Dropped without [`PendingRename::apply`] succeeding, it removes the
/// temporary file.
#[derive(Debug)]
pub(crate) struct PendingRename {
    temp_path: PathBuf,
    target: PathBuf,
    applied: bool,
}

impl PendingRename {
    /// Path the file is renamed to.
    pub(crate) fn target(&self) -> &Path {
        &self.target
    }

    /// Renames the temporary file over the target.
    pub(crate) fn apply(mut self) -> io::Result<()> {
        std::fs::rename(&self.temp_path, &self.target)?;
        self.applied = true;
        Ok(())
    }
}

impl Drop for PendingRename {
    fn drop(&mut self) {
        if !self.applied {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

/// Replaces `target` with `data` atomically.
pub(crate) async fn write_atomic(target: &Path, data: &[u8]) -> CoreResult<()> {
    let staged = StagedFile::new(target, ".tmp");
    staged.write_all(data).await?;
    staged.commit().await
}

/// Reads the first `len` bytes of `path`.
///
/// A file shorter than `len` is reported as an invalid format.
pub(crate) async fn read_preamble(path: &Path, len: usize) -> CoreResult<Vec<u8>> {
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; len];
    match file.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            CoreError::invalid_format(format!("{} is shorter than its preamble", path.display())),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Returns the size of `path` in bytes.
pub(crate) async fn file_len(path: &Path) -> CoreResult<u64> {
    Ok(fs::metadata(path).await?.len())
}

/// Syncs the directory containing `path` so renames within it are durable.
///
/// NTFS journals metadata updates, so this is a no-op off Unix.
#[cfg(unix)]
pub(crate) async fn sync_parent_dir(path: &Path) -> CoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn sync_parent_dir(_path: &Path) -> CoreResult<()> {
    Ok(())
}

/// Blocking form of [`sync_parent_dir`].
#[cfg(unix)]
pub(crate) fn sync_parent_dir_blocking(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_parent_dir_blocking(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_atomic_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.json");

        write_atomic(&path, b"first").await.unwrap();
        write_atomic(&path, b"second").await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"second");
        assert!(!dir.path().join("target.json.tmp").exists());
    }

    #[tokio::test]
    async fn dropped_stage_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.bin");
        fs::write(&path, b"original").await.unwrap();

        {
            let staged = StagedFile::new(&path, ".tmp");
            staged.write_all(b"replacement").await.unwrap();
            assert!(staged.path().exists());
        }

        assert_eq!(fs::read(&path).await.unwrap(), b"original");
        assert!(!dir.path().join("target.bin.tmp").exists());
    }

    #[tokio::test]
    async fn pending_rename_replaces_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.bin");
        fs::write(&path, b"old").await.unwrap();

        let staged = StagedFile::new(&path, ".tmp");
        staged.write_all(b"new").await.unwrap();

        let pending = staged.into_pending();
        assert_eq!(pending.target(), path.as_path());
        pending.apply().unwrap();
        sync_parent_dir_blocking(&path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(!dir.path().join("target.bin.tmp").exists());
    }

    #[tokio::test]
    async fn dropped_pending_rename_removes_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.bin");
        fs::write(&path, b"old").await.unwrap();

        let staged = StagedFile::new(&path, ".tmp");
        staged.write_all(b"new").await.unwrap();
        drop(staged.into_pending());

        assert_eq!(fs::read(&path).await.unwrap(), b"old");
        assert!(!dir.path().join("target.bin.tmp").exists());
    }

    #[tokio::test]
    async fn staged_copy_copies_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let target = dir.path().join("target.bin");
        fs::write(&source, b"payload").await.unwrap();

        let staged = StagedFile::new(&target, ".tmp");
        let copied = staged.copy_from(&source).await.unwrap();
        staged.commit().await.unwrap();
        assert_eq!(copied, 7);
        assert_eq!(fs::read(&target).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn copy_from_missing_source_fails() {
        let dir = tempdir().unwrap();
        let staged = StagedFile::new(&dir.path().join("t"), ".tmp");
        let result = staged.copy_from(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[tokio::test]
    async fn short_preamble_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        fs::write(&path, b"RC").await.unwrap();

        let result = read_preamble(&path, 8).await;
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }
}
