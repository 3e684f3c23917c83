//! Test fixtures and store helpers.
//!
//! Provides a container store backed by a temporary directory that is
//! removed when the fixture is dropped.

use recall_core::{ContainerConfig, ContainerStore, EntryId, EntryType};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the container inside the fixture directory.
pub const CONTAINER_FILE: &str = "memories.bin";

/// A ready container store with automatic cleanup.
pub struct TestContainer {
    /// The store instance.
    pub store: ContainerStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestContainer {
    /// Creates a store with the default configuration in a fresh directory.
    pub async fn new() -> Self {
        Self::with_config(|config| config).await
    }

    /// Creates a store whose configuration is adjusted by `configure`.
    pub async fn with_config(configure: impl FnOnce(ContainerConfig) -> ContainerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(ContainerConfig::new(temp_dir.path().join(CONTAINER_FILE)));
        let store = ContainerStore::open(config)
            .await
            .expect("Failed to open container store");
        Self { store, temp_dir }
    }

    /// Drops the store and opens a new one on the same files.
    ///
    /// Only entries captured by the last manifest write survive.
    pub async fn restart(self) -> Self {
        let Self { store, temp_dir } = self;
        let config = store.config().clone();
        drop(store);
        let store = ContainerStore::open(config)
            .await
            .expect("Failed to reopen container store");
        Self { store, temp_dir }
    }

    /// Directory holding the container and its sidecar files.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for an extra file inside the fixture directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Appends each payload as a plain entry with increasing timestamps.
    pub async fn append_all<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Vec<EntryId> {
        let mut ids = Vec::with_capacity(payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            let id = self
                .store
                .append_entry(payload.as_ref(), i as u64 + 1, EntryType::PLAIN)
                .await
                .expect("Failed to append entry");
            ids.push(id);
        }
        ids
    }

    /// Truncates the container file to `len` bytes behind the store's back.
    pub fn truncate_container(&self, len: u64) {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(self.store.container_path())
            .expect("Failed to open container for truncation");
        file.set_len(len).expect("Failed to truncate container");
    }
}

impl std::ops::Deref for TestContainer {
    type Target = ContainerStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Installs a `tracing` subscriber for test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
