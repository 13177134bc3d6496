//! # Library Module
//!
//! Track model, reactive library queries and the durable store behind the
//! audio content cache.
//!
//! ## Overview
//!
//! This crate provides:
//! - The immutable [`Track`](models::Track) value shared by queue, cache and UI
//! - [`LibrarySource`](source::LibrarySource), the read-only, re-emitting
//!   collections (favorites, songs by most-recently-added) the service consumes
//! - [`SqliteAdapter`](adapters::SqliteAdapter), the sqlx-backed
//!   `DatabaseAdapter`
//! - [`CacheSegmentRepository`](repositories::CacheSegmentRepository), which
//!   persists cached byte segments across restarts

pub mod adapters;
pub mod error;
pub mod models;
pub mod repositories;
pub mod source;

pub use error::{LibraryError, Result};
pub use models::{Track, TrackId, TrackMetadata};
pub use source::{InMemoryLibrary, LibrarySource, TrackList};
