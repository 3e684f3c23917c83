//! Cross-process writer lock for a container.
//!
//! A `<container>.lock` file is held with an exclusive advisory lock for as
//! long as a store is Ready, so two processes can never append to the same
//! container. The lock is released when the file handle is dropped.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Suffix of the lock file next to a container.
const LOCK_SUFFIX: &str = ".lock";

/// Exclusive lock on a container path.
#[derive(Debug)]
pub(crate) struct ContainerLock {
    path: PathBuf,
    _file: File,
}

impl ContainerLock {
    /// Acquires the lock for `container_path` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ContainerLocked`] if another handle holds it.
    pub(crate) async fn acquire(container_path: &Path) -> CoreResult<Self> {
        let mut name = OsString::from(container_path.as_os_str());
        name.push(LOCK_SUFFIX);
        let path = PathBuf::from(name);

        tokio::task::spawn_blocking(move || -> CoreResult<Self> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            if file.try_lock_exclusive().is_err() {
                return Err(CoreError::ContainerLocked);
            }

            Ok(Self { path, _file: file })
        })
        .await
        .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Path of the lock file.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
