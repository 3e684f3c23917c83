//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random payloads and records.

use proptest::prelude::*;
use recall_codec::MemoryRecord;
use recall_core::EntryId;
use std::collections::BTreeMap;

/// Strategy for generating entry IDs.
pub fn entry_id_strategy() -> impl Strategy<Value = EntryId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntryId::from_bytes)
}

/// Strategy for generating payloads (arbitrary bytes, possibly empty).
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating a batch of payloads.
pub fn payloads_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(), 1..=max.max(1))
}

/// Strategy for generating record metadata.
pub fn metadata_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,10}", "[ -~]{0,20}", 0..5)
}

/// Strategy for generating memory records.
pub fn memory_record_strategy() -> impl Strategy<Value = MemoryRecord> {
    (
        prop::array::uniform16(any::<u8>()),
        "\\PC{0,64}",
        metadata_strategy(),
        any::<u64>(),
    )
        .prop_map(|(id, text, metadata, created_at)| MemoryRecord {
            id,
            text,
            metadata,
            created_at,
        })
}
