//! # Core Playback Traits
//!
//! Seams between the playback core and its external collaborators. These are
//! core-level abstractions; host capabilities such as `HttpClient` live in
//! `bridge-traits` and are adapted onto these traits (see
//! [`HttpRangeTransport`](crate::source::HttpRangeTransport)).
//!
//! ## Collaborators
//!
//! - **AudioTransport**: supplies raw audio bytes for a track and byte offset.
//!   May fail or be slow; the core imposes no timeout and relies on
//!   cancellation instead.
//! - **RadioSource**: supplies continuation batches for radio mode.
//! - **AudioSink**: receives the bytes of the current item (the decoder and
//!   output stage live outside the core).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::traits::{AudioTransport, FetchedChunk};
//! use core_library::TrackId;
//!
//! async fn first_kilobyte(transport: &dyn AudioTransport) -> core_playback::Result<FetchedChunk> {
//!     transport.fetch_range(&TrackId::from("abc"), 0, 1024).await
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use core_library::{Track, TrackId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Network Transport
// ============================================================================

/// Bytes returned by a single transport fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedChunk {
    /// Bytes starting at the requested offset. Empty at end of track.
    pub data: Bytes,
    /// Total content length, when the response revealed it.
    pub total_length: Option<u64>,
}

impl FetchedChunk {
    pub fn new(data: Bytes, total_length: Option<u64>) -> Self {
        Self { data, total_length }
    }

    /// An end-of-track marker.
    pub fn end(total_length: Option<u64>) -> Self {
        Self {
            data: Bytes::new(),
            total_length,
        }
    }

    pub fn is_end(&self) -> bool {
        self.data.is_empty()
    }
}

/// Source of raw audio bytes.
///
/// Implementations return at most `max_len` bytes starting at `offset`.
/// Returning fewer bytes is allowed; returning an empty chunk means the
/// offset is at or past the end of the track.
///
/// # Errors
///
/// Network and server failures map to `StreamingFailed` or
/// `SourceUnavailable`; the caller decides retry policy.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn fetch_range(
        &self,
        track_id: &TrackId,
        offset: u64,
        max_len: u64,
    ) -> Result<FetchedChunk>;
}

// ============================================================================
// Radio Continuation Source
// ============================================================================

/// Position within a radio session's continuation sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "token", rename_all = "snake_case")]
pub enum ContinuationCursor {
    /// First batch for a seed.
    Initial,
    /// Opaque token returned by the previous batch.
    Token(String),
}

/// One batch of continuation tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioBatch {
    pub tracks: Vec<Track>,
    /// Cursor for the following batch; `None` when the source is exhausted.
    pub next: Option<String>,
}

impl RadioBatch {
    pub fn new(tracks: Vec<Track>, next: Option<String>) -> Self {
        Self { tracks, next }
    }

    /// A batch signalling that nothing more will follow.
    pub fn exhausted() -> Self {
        Self::default()
    }
}

/// Algorithmic source of "more like this" tracks.
#[async_trait]
pub trait RadioSource: Send + Sync {
    /// Fetch up to `limit` tracks continuing from `cursor`.
    async fn fetch_batch(
        &self,
        seed: &TrackId,
        cursor: &ContinuationCursor,
        limit: usize,
    ) -> Result<RadioBatch>;
}

// ============================================================================
// Output Boundary
// ============================================================================

/// Consumer of the current item's bytes.
///
/// Called from the stream pump task, one call at a time per stream.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Deliver the next chunk of `track_id` starting at byte `offset`.
    async fn on_chunk(&self, track_id: &TrackId, offset: u64, chunk: Bytes) -> Result<()>;

    /// The stream for `track_id` stopped (finished, cancelled or failed).
    async fn on_stop(&self, _track_id: &TrackId) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn on_chunk(&self, _track_id: &TrackId, _offset: u64, _chunk: Bytes) -> Result<()> {
        Ok(())
    }
}
