//! Container storage engine.
//!
//! A container is one append-only file of raw payloads behind a magic
//! preamble. It is not self-describing: offsets, lengths and checksums live
//! in the in-memory index, which is persisted as a JSON manifest next to the
//! container.
//!
//! ## Container Format
//!
//! ```text
//! | magic (8) | payload | payload | ... |
//! ```
//!
//! ## Files
//!
//! - `<container>`: the payload file
//! - `<container>.manifest.json`: the index snapshot
//! - `<container>.lock`: advisory writer lock
//! - `<container>.*.tmp`: staged replacements, removed on failure

mod compaction;
mod files;
mod lock;
mod store;

pub use compaction::CompactionResult;
pub use store::{ContainerStore, ReadFailure, VerifyReport};
