//! # Content Cache
//!
//! Byte-range cache of streamed audio keyed by track.
//!
//! ## Locking
//!
//! - The entry map sits behind a `RwLock`; lookups take the read side and
//!   only entry creation and removal take the write side.
//! - Each entry has its own `Mutex`, so range-set mutations on different
//!   tracks never contend.
//! - Writes that fit in the remaining budget reserve it with a CAS on the
//!   resident counter. Writes that need eviction serialize on an admission
//!   lock so two writers never evict for each other.
//! - No code path acquires the map lock while holding an entry lock.

use super::config::CacheConfig;
use super::persistence::{PersistOp, PersistenceQueue};
use super::range_set::ByteRangeSet;
use super::stats::{CacheCounters, CacheStats};
use crate::error::{PlaybackError, Result};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_async::task::JoinHandle;
use core_library::repositories::CacheSegmentRepository;
use core_library::{Track, TrackId};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Minimum spacing between persisted last-access updates for one entry.
const TOUCH_PERSIST_INTERVAL_MS: i64 = 1_000;

/// Outcome of [`ContentCache::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    /// The whole range was resident.
    Hit(Bytes),
    /// At least one byte is missing; fetch and `write` it.
    Miss,
}

impl CacheRead {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheRead::Hit(_))
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            CacheRead::Hit(bytes) => Some(bytes),
            CacheRead::Miss => None,
        }
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    ranges: ByteRangeSet,
    content_length: Option<u64>,
    last_access_seq: u64,
    last_access_ms: i64,
    persisted_access_ms: i64,
    /// Set once the entry left the map; writers holding a stale handle retry.
    evicted: bool,
}

impl CacheEntry {
    fn is_complete(&self) -> bool {
        match self.content_length {
            Some(len) if len > 0 => self.ranges.covers(0, len),
            _ => false,
        }
    }
}

type EntryHandle = Arc<Mutex<CacheEntry>>;

/// Concurrent byte-range cache with a resident-byte budget.
pub struct ContentCache {
    config: CacheConfig,
    entries: RwLock<HashMap<TrackId, EntryHandle>>,
    resident: AtomicU64,
    access_seq: AtomicU64,
    admission: Mutex<()>,
    counters: CacheCounters,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    repository: Option<Arc<dyn CacheSegmentRepository>>,
    persistence: RwLock<Option<PersistenceQueue>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContentCache {
    /// Create an empty, memory-only cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            resident: AtomicU64::new(0),
            access_seq: AtomicU64::new(0),
            admission: Mutex::new(()),
            counters: CacheCounters::default(),
            clock: Arc::new(SystemClock),
            event_bus: None,
            repository: None,
            persistence: RwLock::new(None),
            writer_task: Mutex::new(None),
        }
    }

    /// Publish cache events on the given bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Override the time source used for persisted last-access stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mirror mutations into `repository` through a write-behind task.
    ///
    /// Must be called inside a tokio runtime. Has no effect on writes unless
    /// `config.persist` is set; [`restore`](Self::restore) works either way.
    pub fn with_repository(mut self, repository: Arc<dyn CacheSegmentRepository>) -> Self {
        if self.config.persist {
            let (queue, handle) =
                PersistenceQueue::spawn(repository.clone(), self.config.persistence_queue_depth);
            *self.persistence.get_mut() = Some(queue);
            *self.writer_task.get_mut() = Some(handle);
        }
        self.repository = Some(repository);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn capacity(&self) -> u64 {
        self.config.max_bytes
    }

    pub fn resident_bytes(&self) -> u64 {
        self.resident.load(Ordering::SeqCst)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn entry(&self, track_id: &TrackId) -> Option<EntryHandle> {
        self.entries.read().get(track_id).cloned()
    }

    fn entry_or_insert(&self, track_id: &TrackId) -> EntryHandle {
        if let Some(entry) = self.entry(track_id) {
            return entry;
        }
        self.entries
            .write()
            .entry(track_id.clone())
            .or_default()
            .clone()
    }

    fn next_seq(&self) -> u64 {
        self.access_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `[offset, offset + len)` is fully resident.
    ///
    /// Never blocks on I/O and does not count as an access for eviction.
    pub fn is_cached(&self, track_id: &TrackId, offset: u64, len: u64) -> bool {
        self.entry(track_id)
            .map(|entry| entry.lock().ranges.covers(offset, len))
            .unwrap_or(false)
    }

    /// Read `[offset, offset + len)` if it is fully resident.
    pub fn read(&self, track_id: &TrackId, offset: u64, len: u64) -> Result<CacheRead> {
        if len == 0 {
            return Err(PlaybackError::InvalidRange(format!(
                "zero-length read at offset {}",
                offset
            )));
        }

        let hit = self.entry(track_id).and_then(|entry| {
            let mut guard = entry.lock();
            let bytes = guard.ranges.read(offset, len)?;
            guard.last_access_seq = self.next_seq();
            guard.last_access_ms = self.clock.unix_timestamp_millis();
            if guard.last_access_ms - guard.persisted_access_ms >= TOUCH_PERSIST_INTERVAL_MS {
                guard.persisted_access_ms = guard.last_access_ms;
                self.persist(PersistOp::Touch {
                    track_id: track_id.clone(),
                    last_access_ms: guard.last_access_ms,
                });
            }
            Some(bytes)
        });

        match hit {
            Some(bytes) => {
                CacheCounters::bump(&self.counters.hits);
                Ok(CacheRead::Hit(bytes))
            }
            None => {
                CacheCounters::bump(&self.counters.misses);
                Ok(CacheRead::Miss)
            }
        }
    }

    /// The resident range of `track_id` that contains `position`.
    pub fn cached_span(&self, track_id: &TrackId, position: u64) -> Option<Range<u64>> {
        self.entry(track_id)
            .and_then(|entry| entry.lock().ranges.span_at(position))
    }

    /// Start of the first resident range after `position`, used to clip
    /// network requests to the gap before it.
    pub fn next_cached_offset(&self, track_id: &TrackId, position: u64) -> Option<u64> {
        self.entry(track_id)
            .and_then(|entry| entry.lock().ranges.next_start_after(position))
    }

    /// Resident ranges of a track, in offset order.
    pub fn ranges(&self, track_id: &TrackId) -> Vec<Range<u64>> {
        self.entry(track_id)
            .map(|entry| entry.lock().ranges.ranges())
            .unwrap_or_default()
    }

    pub fn content_length(&self, track_id: &TrackId) -> Option<u64> {
        self.entry(track_id)
            .and_then(|entry| entry.lock().content_length)
    }

    /// Whether `[0, content_length)` is resident. False while the length is
    /// unknown.
    pub fn is_fully_cached(&self, track_id: &TrackId) -> bool {
        self.entry(track_id)
            .map(|entry| entry.lock().is_complete())
            .unwrap_or(false)
    }

    /// Like [`is_fully_cached`](Self::is_fully_cached), falling back to the
    /// track's declared length when the cache has not learned one.
    pub fn is_track_fully_cached(&self, track: &Track) -> bool {
        let Some(entry) = self.entry(track.id()) else {
            return false;
        };
        let guard = entry.lock();
        match guard.content_length.or(track.content_length()) {
            Some(len) if len > 0 => guard.ranges.covers(0, len),
            _ => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            entries: self.entry_count(),
            resident_bytes: self.resident_bytes(),
            capacity_bytes: self.config.max_bytes,
            ..Default::default()
        };
        self.counters.snapshot_into(&mut stats);
        stats
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Record the total size of a track once a response reveals it.
    pub fn set_content_length(&self, track_id: &TrackId, content_length: u64) {
        if content_length == 0 {
            return;
        }
        let entry = self.entry_or_insert(track_id);
        let mut guard = entry.lock();
        if guard.content_length != Some(content_length) {
            guard.content_length = Some(content_length);
            debug!(track_id = %track_id, content_length, "Content length recorded");
            self.persist(PersistOp::ContentLength {
                track_id: track_id.clone(),
                content_length,
            });
        }
    }

    /// Merge `data` at `offset` into the track's entry.
    ///
    /// Evicts least-recently-accessed entries first when the write would
    /// exceed the budget. The written track is never its own victim.
    ///
    /// # Errors
    ///
    /// - `InvalidRange` for an empty write or one whose end overflows
    /// - `CacheFull` when the track alone would exceed the budget
    ///
    /// In both cases the cache is unchanged.
    #[instrument(skip(self, track_id, data), fields(track_id = %track_id, len = data.len()))]
    pub fn write(&self, track_id: &TrackId, offset: u64, data: Bytes) -> Result<()> {
        let len = data.len() as u64;
        if len == 0 {
            return Err(self.reject(track_id, PlaybackError::InvalidRange(format!(
                "zero-length write at offset {}",
                offset
            ))));
        }
        if offset.checked_add(len).is_none() {
            return Err(self.reject(track_id, PlaybackError::InvalidRange(format!(
                "write of {} bytes at offset {} overflows",
                len, offset
            ))));
        }

        let (own, growth) = self
            .entry(track_id)
            .map(|entry| {
                let guard = entry.lock();
                (guard.ranges.resident_bytes(), guard.ranges.growth(offset, len))
            })
            .unwrap_or((0, len));

        if own + growth > self.config.max_bytes {
            return Err(self.reject(
                track_id,
                PlaybackError::CacheFull {
                    requested: own + growth,
                    capacity: self.config.max_bytes,
                },
            ));
        }

        let reserved = if growth == 0 {
            0
        } else if self.try_reserve(growth) {
            growth
        } else {
            let _admission = self.admission.lock();
            let overflow = (self.resident_bytes() + growth).saturating_sub(self.config.max_bytes);
            if overflow > 0 {
                let freed = self.evict_excluding(overflow, Some(track_id));
                debug!(overflow, freed, "Evicted to admit write");
            }
            self.resident.fetch_add(growth, Ordering::SeqCst);
            growth
        };

        let now_ms = self.clock.unix_timestamp_millis();
        let added = loop {
            let entry = self.entry_or_insert(track_id);
            let mut guard = entry.lock();
            if guard.evicted {
                continue;
            }
            let added = guard.ranges.insert(offset, data.clone());
            guard.last_access_seq = self.next_seq();
            guard.last_access_ms = now_ms;
            guard.persisted_access_ms = now_ms;
            // Queued under the entry lock so it cannot overtake the Delete
            // of a concurrent eviction.
            self.persist(PersistOp::Upsert {
                track_id: track_id.clone(),
                offset,
                data: data.clone(),
                last_access_ms: now_ms,
            });
            break added;
        };

        if added != reserved {
            if added > reserved {
                self.resident.fetch_add(added - reserved, Ordering::SeqCst);
            } else {
                self.resident.fetch_sub(reserved - added, Ordering::SeqCst);
            }
        }

        CacheCounters::bump(&self.counters.writes);
        self.emit(CacheEvent::RangeWritten {
            track_id: track_id.to_string(),
            offset,
            len,
        });

        // Concurrent writers may have pushed the total past the budget.
        let overflow = self.resident_bytes().saturating_sub(self.config.max_bytes);
        if overflow > 0 {
            let _admission = self.admission.lock();
            let overflow = self.resident_bytes().saturating_sub(self.config.max_bytes);
            if overflow > 0 {
                self.evict_excluding(overflow, Some(track_id));
            }
        }

        Ok(())
    }

    fn try_reserve(&self, bytes: u64) -> bool {
        let max = self.config.max_bytes;
        self.resident
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(bytes).filter(|total| *total <= max)
            })
            .is_ok()
    }

    fn reject(&self, track_id: &TrackId, error: PlaybackError) -> PlaybackError {
        warn!(track_id = %track_id, error = %error, "Cache write rejected");
        CacheCounters::bump(&self.counters.rejected_writes);
        self.emit(CacheEvent::WriteRejected {
            track_id: track_id.to_string(),
            reason: error.to_string(),
        });
        error
    }

    /// Remove entries, least recently accessed first, until at least
    /// `target_bytes` are reclaimed or nothing is left. Returns bytes freed.
    #[instrument(skip(self))]
    pub fn evict(&self, target_bytes: u64) -> u64 {
        let _admission = self.admission.lock();
        self.evict_excluding(target_bytes, None)
    }

    fn evict_excluding(&self, target_bytes: u64, exclude: Option<&TrackId>) -> u64 {
        let mut candidates: Vec<(u64, TrackId, EntryHandle)> = self
            .entries
            .read()
            .iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .map(|(id, entry)| (entry.lock().last_access_seq, id.clone(), entry.clone()))
            .collect();
        candidates.sort_by_key(|(seq, _, _)| *seq);

        let mut freed = 0;
        for (_, track_id, entry) in candidates {
            if freed >= target_bytes {
                break;
            }
            if let Some(bytes) = self.remove_entry(&track_id, &entry) {
                freed += bytes;
                CacheCounters::bump(&self.counters.evictions);
                self.counters
                    .evicted_bytes
                    .fetch_add(bytes, Ordering::Relaxed);
                debug!(track_id = %track_id, bytes, "Evicted cache entry");
                self.emit(CacheEvent::Evicted {
                    track_id: track_id.to_string(),
                    bytes,
                });
            }
        }

        if freed < target_bytes {
            warn!(target_bytes, freed, "Eviction ran out of candidates");
        }
        freed
    }

    /// Detach an entry from the map and release its bytes. Returns `None`
    /// when another caller removed it first.
    fn remove_entry(&self, track_id: &TrackId, entry: &EntryHandle) -> Option<u64> {
        let bytes = {
            let mut guard = entry.lock();
            if guard.evicted {
                return None;
            }
            guard.evicted = true;
            self.persist(PersistOp::Delete {
                track_id: track_id.clone(),
            });
            guard.ranges.resident_bytes()
        };

        {
            let mut entries = self.entries.write();
            if entries
                .get(track_id)
                .is_some_and(|current| Arc::ptr_eq(current, entry))
            {
                entries.remove(track_id);
            }
        }

        self.resident.fetch_sub(bytes, Ordering::SeqCst);
        Some(bytes)
    }

    /// Drop one track. Returns the bytes released.
    pub fn remove(&self, track_id: &TrackId) -> u64 {
        let _admission = self.admission.lock();
        self.entry(track_id)
            .and_then(|entry| self.remove_entry(track_id, &entry))
            .unwrap_or(0)
    }

    /// Drop every entry.
    pub fn clear(&self) -> u64 {
        let _admission = self.admission.lock();
        let all: Vec<(TrackId, EntryHandle)> = self
            .entries
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        all.iter()
            .filter_map(|(id, entry)| self.remove_entry(id, entry))
            .sum()
    }

    // ------------------------------------------------------------------------
    // Durable store
    // ------------------------------------------------------------------------

    /// Reload persisted entries, most recently accessed first, until the
    /// budget is reached. Entries that no longer fit are deleted from the
    /// store. Returns the number of entries restored.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize> {
        let Some(repository) = self.repository.clone() else {
            return Ok(0);
        };

        let stored = repository.load_all().await?;
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        let mut budget_used = 0u64;

        for entry in stored {
            let bytes = entry.resident_bytes();
            if budget_used + bytes <= self.config.max_bytes {
                budget_used += bytes;
                kept.push(entry);
            } else {
                dropped.push(entry.track_id);
            }
        }

        let _admission = self.admission.lock();
        // Oldest first so the most recent entry gets the highest sequence.
        for stored_entry in kept.iter().rev() {
            let handle = self.entry_or_insert(&stored_entry.track_id);
            let mut guard = handle.lock();
            let mut added = 0;
            for segment in &stored_entry.segments {
                added += guard
                    .ranges
                    .insert(segment.offset, Bytes::from(segment.data.clone()));
            }
            if guard.content_length.is_none() {
                guard.content_length = stored_entry.content_length;
            }
            guard.last_access_seq = self.next_seq();
            guard.last_access_ms = stored_entry.last_access_ms;
            guard.persisted_access_ms = stored_entry.last_access_ms;
            self.resident.fetch_add(added, Ordering::SeqCst);
        }
        drop(_admission);

        for track_id in &dropped {
            if let Err(e) = repository.delete_track(track_id).await {
                warn!(track_id = %track_id, error = %e, "Failed to drop over-budget stored entry");
            }
        }

        let restored = kept.len();
        info!(
            entries = restored,
            dropped = dropped.len(),
            bytes = self.resident_bytes(),
            "Content cache restored"
        );
        self.emit(CacheEvent::Restored {
            entries: restored,
            bytes: self.resident_bytes(),
        });

        // Entries already present in memory may push the total past budget.
        let overflow = self.resident_bytes().saturating_sub(self.config.max_bytes);
        if overflow > 0 {
            self.evict(overflow);
        }

        Ok(restored)
    }

    /// Stop mirroring into the durable store and wait for queued operations
    /// to be written. Later mutations stay memory-only.
    pub async fn shutdown(&self) {
        self.persistence.write().take();
        let writer = self.writer_task.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "Cache persistence writer panicked");
            }
        }
    }

    fn persist(&self, op: PersistOp) {
        if let Some(queue) = self.persistence.read().as_ref() {
            queue.enqueue(op);
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("capacity", &self.config.max_bytes)
            .field("resident_bytes", &self.resident_bytes())
            .field("entries", &self.entry_count())
            .field("persistent", &self.persistence.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_bytes: u64) -> ContentCache {
        ContentCache::new(CacheConfig::new().with_max_bytes(max_bytes))
    }

    fn id(s: &str) -> TrackId {
        TrackId::from(s)
    }

    #[test]
    fn test_write_then_read() {
        let cache = cache(1_000);
        cache
            .write(&id("a"), 10, Bytes::from_static(b"hello"))
            .unwrap();

        assert!(cache.is_cached(&id("a"), 10, 5));
        assert!(!cache.is_cached(&id("a"), 9, 5));
        assert_eq!(
            cache.read(&id("a"), 11, 3).unwrap(),
            CacheRead::Hit(Bytes::from_static(b"ell"))
        );
        assert_eq!(cache.read(&id("a"), 0, 3).unwrap(), CacheRead::Miss);
        assert_eq!(cache.read(&id("b"), 0, 3).unwrap(), CacheRead::Miss);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.resident_bytes, 5);
    }

    #[test]
    fn test_zero_length_write_rejected() {
        let cache = cache(1_000);
        let result = cache.write(&id("a"), 0, Bytes::new());
        assert!(matches!(result, Err(PlaybackError::InvalidRange(_))));
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats().rejected_writes, 1);
    }

    #[test]
    fn test_overflowing_range_rejected() {
        let cache = cache(1_000);
        let result = cache.write(&id("a"), u64::MAX - 1, Bytes::from_static(b"abc"));
        assert!(matches!(result, Err(PlaybackError::InvalidRange(_))));
    }

    #[test]
    fn test_oversized_write_leaves_cache_unchanged() {
        let cache = cache(100);
        cache.write(&id("a"), 0, Bytes::from(vec![1u8; 50])).unwrap();

        let result = cache.write(&id("b"), 0, Bytes::from(vec![2u8; 101]));
        assert!(matches!(result, Err(PlaybackError::CacheFull { .. })));
        assert!(cache.is_cached(&id("a"), 0, 50));
        assert_eq!(cache.resident_bytes(), 50);
    }

    #[test]
    fn test_lru_victim_is_least_recently_accessed() {
        let cache = cache(1_000);
        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        // Reading `a` makes `b` the oldest.
        assert!(cache.read(&id("a"), 0, 10).unwrap().is_hit());

        cache.write(&id("c"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        assert!(cache.is_cached(&id("a"), 0, 400));
        assert!(!cache.is_cached(&id("b"), 0, 1));
        assert!(cache.is_cached(&id("c"), 0, 400));
        assert_eq!(cache.resident_bytes(), 800);
    }

    #[test]
    fn test_is_cached_does_not_refresh_lru() {
        let cache = cache(1_000);
        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        assert!(cache.is_cached(&id("a"), 0, 400));

        cache.write(&id("c"), 0, Bytes::from(vec![0u8; 400])).unwrap();
        assert!(!cache.is_cached(&id("a"), 0, 1));
        assert!(cache.is_cached(&id("b"), 0, 400));
    }

    #[test]
    fn test_evict_reports_freed_bytes() {
        let cache = cache(1_000);
        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 100])).unwrap();
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 200])).unwrap();

        assert_eq!(cache.evict(50), 100);
        assert_eq!(cache.evict(10_000), 200);
        assert_eq!(cache.evict(1), 0);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn test_fully_cached_requires_known_length() {
        let cache = cache(1_000);
        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 10])).unwrap();
        assert!(!cache.is_fully_cached(&id("a")));

        cache.set_content_length(&id("a"), 10);
        assert!(cache.is_fully_cached(&id("a")));

        let declared = Track::new("b", std::time::Duration::from_secs(1)).with_content_length(4);
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 4])).unwrap();
        assert!(!cache.is_fully_cached(&id("b")));
        assert!(cache.is_track_fully_cached(&declared));
    }

    #[test]
    fn test_cached_span_and_next_offset() {
        let cache = cache(1_000);
        cache.write(&id("a"), 100, Bytes::from(vec![0u8; 50])).unwrap();

        assert_eq!(cache.cached_span(&id("a"), 120), Some(100..150));
        assert_eq!(cache.cached_span(&id("a"), 10), None);
        assert_eq!(cache.next_cached_offset(&id("a"), 10), Some(100));
        assert_eq!(cache.ranges(&id("a")), vec![100..150]);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache(1_000);
        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 10])).unwrap();
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 20])).unwrap();

        assert_eq!(cache.remove(&id("a")), 10);
        assert_eq!(cache.remove(&id("a")), 0);
        assert_eq!(cache.clear(), 20);
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let cache = cache(100).with_event_bus(bus);

        cache.write(&id("a"), 0, Bytes::from(vec![0u8; 60])).unwrap();
        cache.write(&id("b"), 0, Bytes::from(vec![0u8; 60])).unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&CoreEvent::Cache(CacheEvent::Evicted {
            track_id: "a".into(),
            bytes: 60
        })));
        assert_eq!(
            seen.iter()
                .filter(|e| matches!(e, CoreEvent::Cache(CacheEvent::RangeWritten { .. })))
                .count(),
            2
        );
    }
}
