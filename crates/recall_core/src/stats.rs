//! Store statistics.
//!
//! All counters are atomic and can be read while operations are in
//! progress. Corruption detections are counted here because a short read
//! or checksum mismatch is otherwise reported to callers as a plain miss.

use std::sync::atomic::{AtomicU64, Ordering};

/// Container store counters.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Successful appends.
    appends: AtomicU64,
    /// Reads that returned a payload.
    reads: AtomicU64,
    /// Lookups for ids not in the index.
    misses: AtomicU64,
    /// Reads that found fewer or different bytes than indexed.
    corruptions: AtomicU64,
    /// Completed compactions.
    compactions: AtomicU64,
    /// Manifest snapshots written.
    snapshots: AtomicU64,
    /// Payload bytes appended.
    bytes_written: AtomicU64,
    /// Payload bytes returned by reads.
    bytes_read: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, bytes: u64) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot(&self) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of successful appends.
    pub fn appends(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    /// Returns the number of reads that returned a payload.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of lookups for unknown ids.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of detected corruptions.
    ///
    /// A non-zero value means the container and index have diverged.
    pub fn corruptions(&self) -> u64 {
        self.corruptions.load(Ordering::Relaxed)
    }

    /// Returns the number of completed compactions.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Returns the number of manifest snapshots written.
    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    /// Returns the total payload bytes appended.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the total payload bytes read.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appends: self.appends(),
            reads: self.reads(),
            misses: self.misses(),
            corruptions: self.corruptions(),
            compactions: self.compactions(),
            snapshots: self.snapshots(),
            bytes_written: self.bytes_written(),
            bytes_read: self.bytes_read(),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Successful appends.
    pub appends: u64,
    /// Reads that returned a payload.
    pub reads: u64,
    /// Lookups for unknown ids.
    pub misses: u64,
    /// Detected corruptions.
    pub corruptions: u64,
    /// Completed compactions.
    pub compactions: u64,
    /// Manifest snapshots written.
    pub snapshots: u64,
    /// Payload bytes appended.
    pub bytes_written: u64,
    /// Payload bytes read.
    pub bytes_read: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = StoreStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = StoreStats::new();

        stats.record_append(10);
        stats.record_append(5);
        stats.record_read(10);
        stats.record_miss();
        stats.record_corruption();

        let snap = stats.snapshot();
        assert_eq!(snap.appends, 2);
        assert_eq!(snap.bytes_written, 15);
        assert_eq!(snap.reads, 1);
        assert_eq!(snap.bytes_read, 10);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.corruptions, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(StoreStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_append(1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.appends(), 800);
        assert_eq!(stats.bytes_written(), 800);
    }
}
