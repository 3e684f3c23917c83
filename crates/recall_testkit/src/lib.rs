//! # Recall Testkit
//!
//! Test utilities for Recall.
//!
//! This crate provides:
//! - A temporary, ready-to-use container store fixture
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recall_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_store() {
//!     let container = TestContainer::new().await;
//!     let id = container.append_entry(b"x", 1, EntryType::PLAIN).await.unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
