//! # Recall Core
//!
//! Append-only, attestable storage for memory records.
//!
//! This crate provides:
//! - [`ContainerStore`]: an append-only container file with an in-memory
//!   index, JSON manifest snapshots, compaction, export and import
//! - [`Signer`]: Ed25519 detached signatures with PEM key exchange
//! - [`SecretProvider`]: named secret lookup with zeroize-on-drop values
//!
//! Payloads are opaque bytes. [`recall_codec`] turns records into payloads;
//! a signed payload is usually a [`recall_codec::SignedRecord`] wrapping the
//! record bytes and a signature over them.
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> recall_core::CoreResult<()> {
//! use recall_codec::{Encode, MemoryRecord, SignedRecord};
//! use recall_core::{now_millis, ContainerConfig, ContainerStore, EntryType, Signer};
//!
//! let store = ContainerStore::open(ContainerConfig::new("memories.bin")).await?;
//! let signer = Signer::generate();
//!
//! let record = MemoryRecord::new([7; 16], "remember this", now_millis()).encode()?;
//! let signature = signer.sign(&record)?;
//! let payload = SignedRecord::new(record, signature).encode()?;
//!
//! let id = store.append_entry(&payload, now_millis(), EntryType::SIGNED).await?;
//! store.snapshot_manifest().await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Operations emit `tracing` events. The crate installs no subscriber.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod container;
mod crypto;
mod entry;
mod error;
mod manifest;
mod secret;
mod stats;

pub use config::{
    manifest_path_for, ContainerConfig, SignerConfig, CONTAINER_MAGIC, MANIFEST_SUFFIX,
};
pub use container::{CompactionResult, ContainerStore, ReadFailure, VerifyReport};
pub use crypto::{digest, verify_with_public_key_pem, Signer, DIGEST_LEN, SIGNATURE_LEN};
pub use entry::{now_millis, EntryId, EntryInfo, EntryType};
pub use error::{CoreError, CoreResult};
pub use manifest::{Manifest, EMPTY_MANIFEST};
pub use secret::{EnvSecretProvider, SecretProvider};
pub use stats::{StatsSnapshot, StoreStats};
