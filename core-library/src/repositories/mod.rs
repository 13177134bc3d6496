//! # Repository Pattern Implementation
//!
//! Repository traits and their SQL implementations over the
//! `DatabaseAdapter` bridge.
//!
//! ## Available Repositories
//!
//! - `CacheSegmentRepository` - Resident byte segments and per-track cache
//!   bookkeeping (content length, last access)

pub mod cache;

pub use cache::{CacheSegmentRepository, SqliteCacheSegmentRepository, StoredEntry, StoredSegment};
