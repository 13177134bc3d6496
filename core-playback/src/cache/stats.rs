//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time statistics about the content cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of tracks with an entry
    pub entries: usize,

    /// Bytes currently resident across all entries
    pub resident_bytes: u64,

    /// Configured budget
    pub capacity_bytes: u64,

    /// Reads served from resident bytes
    pub hits: u64,

    /// Reads that fell through to the network
    pub misses: u64,

    /// Accepted writes
    pub writes: u64,

    /// Writes rejected with `InvalidRange` or `CacheFull`
    pub rejected_writes: u64,

    /// Entries removed by eviction
    pub evictions: u64,

    /// Bytes reclaimed by eviction
    pub evicted_bytes: u64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of capacity.
    pub fn usage_percentage(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }

        (self.resident_bytes as f64 / self.capacity_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Fraction of reads that hit, 0.0 when nothing was read yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters updated on the hot paths.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
    pub rejected_writes: AtomicU64,
    pub evictions: AtomicU64,
    pub evicted_bytes: AtomicU64,
}

impl CacheCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_into(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.writes = self.writes.load(Ordering::Relaxed);
        stats.rejected_writes = self.rejected_writes.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
        stats.evicted_bytes = self.evicted_bytes.load(Ordering::Relaxed);
    }
}
