//! Error types for Recall core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Recall core operations.
///
/// A missing entry is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Manifest could not be serialized or parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Entry codec error.
    #[error("codec error: {0}")]
    Codec(#[from] recall_codec::CodecError),

    /// Container or manifest has an unexpected format.
    #[error("invalid container format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The store has not been initialized with `ensure_created`.
    #[error("container store is not initialized")]
    NotInitialized,

    /// Another handle holds the container's writer lock.
    #[error("container locked: another writer has exclusive access")]
    ContainerLocked,

    /// Signer configuration is unusable.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// Signing was requested from a verify-only signer.
    #[error("signer holds no private key")]
    MissingPrivateKey,

    /// Key material could not be parsed or encoded.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the key problem.
        message: String,
    },

    /// A signature did not verify.
    #[error("signature verification failed")]
    SignatureInvalid,
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}
