//! Store and signer configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Magic preamble written at the start of every new container file.
pub const CONTAINER_MAGIC: [u8; 8] = *b"RCLCNT01";

/// Suffix appended to a container path to name its manifest.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Returns the manifest path paired with a container path.
///
/// `memories.bin` pairs with `memories.bin.manifest.json`.
#[must_use]
pub fn manifest_path_for(container_path: &Path) -> PathBuf {
    let mut name = OsString::from(container_path.as_os_str());
    name.push(MANIFEST_SUFFIX);
    PathBuf::from(name)
}

/// Configuration for a container store.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Path of the append-only container file.
    pub container_path: PathBuf,

    /// Path of the sidecar manifest file.
    pub manifest_path: PathBuf,

    /// Preamble written at creation and checked on open.
    pub magic: Vec<u8>,

    /// Whether to `fsync` file data after every append (safer but slower).
    pub sync_on_append: bool,

    /// Whether reads compare payloads against their recorded CRC32.
    pub verify_checksums: bool,
}

impl ContainerConfig {
    /// Creates a configuration for the container at `path`.
    ///
    /// The manifest defaults to `path` + [`MANIFEST_SUFFIX`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let container_path = path.into();
        let manifest_path = manifest_path_for(&container_path);
        Self {
            container_path,
            manifest_path,
            magic: CONTAINER_MAGIC.to_vec(),
            sync_on_append: true,
            verify_checksums: true,
        }
    }

    /// Overrides the manifest location.
    #[must_use]
    pub fn manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Sets a custom magic preamble.
    #[must_use]
    pub fn magic(mut self, magic: impl Into<Vec<u8>>) -> Self {
        self.magic = magic.into();
        self
    }

    /// Sets whether to sync file data on every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets whether reads verify payload checksums.
    #[must_use]
    pub const fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }
}

/// Configuration for constructing a [`crate::Signer`].
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// PKCS#8 PEM file holding the private key.
    pub private_key_path: Option<PathBuf>,

    /// SPKI PEM file holding the public key.
    pub public_key_path: Option<PathBuf>,

    /// Generate a fresh keypair when no key material can be loaded.
    pub auto_generate: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            private_key_path: None,
            public_key_path: None,
            auto_generate: true,
        }
    }
}

impl SignerConfig {
    /// Creates a configuration with no key paths and auto-generation on.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the private key PEM path.
    #[must_use]
    pub fn private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Sets the public key PEM path.
    #[must_use]
    pub fn public_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_key_path = Some(path.into());
        self
    }

    /// Sets whether a keypair may be generated when none is found.
    #[must_use]
    pub const fn auto_generate(mut self, value: bool) -> Self {
        self.auto_generate = value;
        self
    }
}
