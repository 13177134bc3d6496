//! # Content Cache Module
//!
//! Byte-range cache for streamed audio.
//!
//! ## Overview
//!
//! Tracks are cached as sparse sets of byte ranges rather than whole files,
//! so a seek into an uncached region only fetches that region. Key features:
//! - Coalescing range sets with zero-copy reads
//! - Whole-entry LRU eviction under a resident-byte budget
//! - Optional write-behind persistence through `CacheSegmentRepository`
//! - Event emission for writes, evictions and rejected writes
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     ContentCache                       │
//! │  - write() / read()                    │
//! │  - is_cached() / cached_span()         │
//! │  - evict() / restore()                 │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> ByteRangeSet (per track, in memory)
//!          ├──> CacheCounters (hit/miss/eviction stats)
//!          └──> PersistenceQueue ──> CacheSegmentRepository (DB)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bytes::Bytes;
//! use core_playback::cache::{CacheConfig, CacheRead, ContentCache};
//! use core_library::TrackId;
//!
//! let cache = ContentCache::new(CacheConfig::new().with_max_bytes(64 * 1024 * 1024));
//! let track = TrackId::from("abc");
//!
//! cache.write(&track, 0, Bytes::from_static(b"audio bytes"))?;
//! if let CacheRead::Hit(bytes) = cache.read(&track, 0, 5)? {
//!     assert_eq!(&bytes[..], b"audio");
//! }
//! ```

pub mod config;
pub(crate) mod persistence;
pub mod range_set;
pub mod stats;
pub mod store;

pub use config::{CacheConfig, EvictionPolicy};
pub use range_set::ByteRangeSet;
pub use stats::CacheStats;
pub use store::{CacheRead, ContentCache};
