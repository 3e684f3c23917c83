//! # Recall Codec
//!
//! Entry codec for Recall.
//!
//! The container store only ever sees opaque byte payloads. This crate is
//! the leaf that turns domain records into those payloads and back:
//! - [`MemoryRecord`] - a plain long-term memory item
//! - [`SignedRecord`] - an encoded payload plus its detached signature
//!
//! Encoding is CBOR. Equal records always encode to identical bytes, so a
//! digest over an encoded record is stable and can be signed.
//!
//! ## Usage
//!
//! ```
//! use recall_codec::{Decode, Encode, MemoryRecord};
//!
//! let record = MemoryRecord::new([7u8; 16], "the sky is blue", 1_700_000_000_000)
//!     .with_metadata("source", "chat");
//! let bytes = record.encode().unwrap();
//! let decoded = MemoryRecord::decode(&bytes).unwrap();
//! assert_eq!(record, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;

pub use error::{CodecError, CodecResult};
pub use record::{MemoryRecord, SignedRecord};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for types that can be encoded to a payload.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from a payload.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

/// Encode any serializable value to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if serialization fails.
pub fn to_cbor<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decode a value from CBOR bytes.
///
/// Trailing bytes after the first complete item are rejected.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] on malformed or trailing input.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::decoding_failed(format!(
            "{} trailing bytes after record",
            reader.len()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_plain_value() {
        let bytes = to_cbor(&42u32).unwrap();
        let decoded: u32 = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_cbor(&"hello").unwrap();
        bytes.push(0x00);
        let result: CodecResult<String> = from_cbor(&bytes);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = to_cbor(&"hello world").unwrap();
        let result: CodecResult<String> = from_cbor(&bytes[..bytes.len() - 3]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_input_rejected() {
        let result: CodecResult<u32> = from_cbor(&[]);
        assert!(result.is_err());
    }
}
