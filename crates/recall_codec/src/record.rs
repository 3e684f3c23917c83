//! Domain records stored in the container.

use crate::error::CodecResult;
use crate::{from_cbor, to_cbor, Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single long-term memory item.
///
/// Metadata is kept in a `BTreeMap` so encoding is independent of
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Record identifier chosen by the caller (UUID bytes).
    pub id: [u8; 16],
    /// Free-form memory text.
    pub text: String,
    /// String key/value annotations.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Creation time in Unix milliseconds.
    pub created_at: u64,
}

impl MemoryRecord {
    /// Creates a record with no metadata.
    #[must_use]
    pub fn new(id: [u8; 16], text: impl Into<String>, created_at: u64) -> Self {
        Self {
            id,
            text: text.into(),
            metadata: BTreeMap::new(),
            created_at,
        }
    }

    /// Adds a metadata entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl Encode for MemoryRecord {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl Decode for MemoryRecord {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

/// An encoded payload together with a detached signature over its digest.
///
/// The codec does not interpret `payload`; it is normally an encoded
/// [`MemoryRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRecord {
    /// The signed payload bytes.
    pub payload: Vec<u8>,
    /// Detached signature bytes.
    pub signature: Vec<u8>,
    /// PEM of the public key that produced `signature`, if recorded.
    #[serde(default)]
    pub public_key_pem: Option<String>,
}

impl SignedRecord {
    /// Creates a signed record.
    #[must_use]
    pub fn new(payload: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            payload,
            signature,
            public_key_pem: None,
        }
    }

    /// Attaches the signer's public key.
    #[must_use]
    pub fn with_public_key_pem(mut self, pem: impl Into<String>) -> Self {
        self.public_key_pem = Some(pem.into());
        self
    }

    /// Decodes the inner payload as a [`MemoryRecord`].
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the payload is not a memory record.
    pub fn record(&self) -> CodecResult<MemoryRecord> {
        MemoryRecord::decode(&self.payload)
    }
}

impl Encode for SignedRecord {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl Decode for SignedRecord {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_record_roundtrip() {
        let record = MemoryRecord::new([1u8; 16], "remember the milk", 1_000)
            .with_metadata("topic", "groceries")
            .with_metadata("priority", "low");
        let bytes = record.encode().unwrap();
        assert_eq!(MemoryRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn metadata_order_does_not_change_bytes() {
        let a = MemoryRecord::new([2u8; 16], "x", 5)
            .with_metadata("a", "1")
            .with_metadata("b", "2");
        let b = MemoryRecord::new([2u8; 16], "x", 5)
            .with_metadata("b", "2")
            .with_metadata("a", "1");
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn signed_record_wraps_memory_record() {
        let inner = MemoryRecord::new([3u8; 16], "signed fact", 9);
        let signed = SignedRecord::new(inner.encode().unwrap(), vec![0xAB; 64])
            .with_public_key_pem("-----BEGIN PUBLIC KEY-----");
        let bytes = signed.encode().unwrap();
        let decoded = SignedRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.record().unwrap(), inner);
    }

    #[test]
    fn garbage_is_not_a_record() {
        assert!(MemoryRecord::decode(b"not cbor at all").is_err());
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(
            text in ".{0,64}",
            created_at in any::<u64>(),
            pairs in prop::collection::vec(("[a-z]{1,8}", ".{0,16}"), 0..6),
        ) {
            let mut record = MemoryRecord::new([9u8; 16], text, created_at);
            for (k, v) in pairs {
                record = record.with_metadata(k, v);
            }
            let first = record.encode().unwrap();
            let second = record.clone().encode().unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(MemoryRecord::decode(&first).unwrap(), record);
        }
    }
}
