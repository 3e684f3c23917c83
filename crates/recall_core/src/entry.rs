//! Entry identifiers and index metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a container entry.
///
/// Entry IDs are random 128-bit UUIDs that are:
/// - Assigned by the store at append time
/// - Stable across compaction
/// - Never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-defined payload kind. The store never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryType(pub u8);

impl EntryType {
    /// A plain encoded record.
    pub const PLAIN: Self = Self(0);
    /// A record wrapped with a detached signature.
    pub const SIGNED: Self = Self(1);

    /// Returns the raw tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}

/// Index metadata for one entry. Payload bytes live in the container file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Entry identifier.
    pub id: EntryId,
    /// Byte offset of the payload within the container file.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u64,
    /// Append timestamp in Unix milliseconds.
    pub created_at: u64,
    /// Payload kind tag.
    pub entry_type: EntryType,
    /// CRC32 of the payload, absent in manifests written without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<u32>,
}

impl EntryInfo {
    /// Offset one past the last payload byte.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Returns true if the two byte ranges share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Current wall-clock time in Unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(offset: u64, length: u64) -> EntryInfo {
        EntryInfo {
            id: EntryId::new(),
            offset,
            length,
            created_at: 0,
            entry_type: EntryType::PLAIN,
            checksum: None,
        }
    }

    #[test]
    fn ids_are_unique() {
        let a = EntryId::new();
        let b = EntryId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn id_bytes_roundtrip() {
        let id = EntryId::new();
        assert_eq!(EntryId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn id_serializes_as_uuid_string() {
        let id = EntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_uuid()));
    }

    #[test]
    fn ranges_overlap() {
        assert!(info(10, 5).overlaps(&info(12, 5)));
        assert!(!info(10, 5).overlaps(&info(15, 5)));
        assert!(!info(10, 0).overlaps(&info(10, 5)));
    }

    #[test]
    fn missing_checksum_deserializes() {
        let json = r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","offset":8,"length":3,"created_at":1,"entry_type":0}"#;
        let parsed: EntryInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.checksum, None);
        assert_eq!(parsed.end(), 11);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
