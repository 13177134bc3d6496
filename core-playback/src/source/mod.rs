//! # Track Source
//!
//! Turns a track into a lazy, forward-only byte stream that prefers cached
//! bytes and falls back to the network transport.
//!
//! ```text
//! ByteStream::next_chunk()
//!     │
//!     ├── cached_span(position)? ──> ContentCache::read ──> chunk
//!     │
//!     └── miss ──> AudioTransport::fetch_range ──> chunk
//!                        │
//!                        └── spawn ──> ContentCache::write (failures logged)
//! ```
//!
//! Cache population never delays delivery: fetched bytes are returned to the
//! caller first and written back on a detached task.

mod http;

pub use http::{HttpRangeTransport, UrlResolver};

use crate::cache::{CacheRead, ContentCache};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::traits::AudioTransport;
use bytes::Bytes;
use core_async::sync::CancellationToken;
use core_library::{Track, TrackId};
use futures::Stream;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Resolves tracks to byte streams.
#[derive(Clone)]
pub struct TrackSource {
    cache: Arc<ContentCache>,
    transport: Arc<dyn AudioTransport>,
    chunk_size: u64,
    write_back: bool,
}

impl TrackSource {
    pub fn new(
        cache: Arc<ContentCache>,
        transport: Arc<dyn AudioTransport>,
        config: &PlaybackConfig,
    ) -> Self {
        Self {
            cache,
            transport,
            chunk_size: config.chunk_size.max(1) as u64,
            write_back: config.cache_write_back,
        }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Open a stream over `track` from `start_offset` to its end.
    ///
    /// Nothing is fetched until the first [`ByteStream::next_chunk`] call.
    /// Cancelling `cancel` makes every later call return `Cancelled`.
    pub fn open_stream(
        &self,
        track: &Track,
        start_offset: u64,
        cancel: CancellationToken,
    ) -> ByteStream {
        let content_length = self
            .cache
            .content_length(track.id())
            .or(track.content_length());
        debug!(
            track_id = %track.id(),
            start_offset,
            content_length = ?content_length,
            "Opening track stream"
        );
        ByteStream {
            track_id: track.id().clone(),
            position: start_offset,
            content_length,
            cache: self.cache.clone(),
            transport: self.transport.clone(),
            chunk_size: self.chunk_size,
            write_back: self.write_back,
            cancel,
            finished: false,
        }
    }
}

impl std::fmt::Debug for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSource")
            .field("chunk_size", &self.chunk_size)
            .field("write_back", &self.write_back)
            .finish()
    }
}

/// Byte stream over one track.
pub struct ByteStream {
    track_id: TrackId,
    position: u64,
    content_length: Option<u64>,
    cache: Arc<ContentCache>,
    transport: Arc<dyn AudioTransport>,
    chunk_size: u64,
    write_back: bool,
    cancel: CancellationToken,
    finished: bool,
}

impl ByteStream {
    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    /// Offset of the next byte this stream will yield.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Next chunk, or `None` at end of track.
    ///
    /// # Errors
    ///
    /// - `Cancelled` once the stream's token is cancelled, including when a
    ///   fetch completes after cancellation (its bytes are discarded)
    /// - Transport errors, unchanged
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        let remaining = self
            .content_length
            .map(|total| total.saturating_sub(self.position));
        if remaining == Some(0) {
            self.finished = true;
            return Ok(None);
        }

        if let Some(chunk) = self.read_cached(remaining)? {
            return Ok(Some(chunk));
        }

        self.fetch(remaining).await
    }

    fn read_cached(&mut self, remaining: Option<u64>) -> Result<Option<Bytes>> {
        let Some(span) = self.cache.cached_span(&self.track_id, self.position) else {
            return Ok(None);
        };
        let mut len = (span.end - self.position).min(self.chunk_size);
        if let Some(remaining) = remaining {
            len = len.min(remaining);
        }
        match self.cache.read(&self.track_id, self.position, len)? {
            CacheRead::Hit(bytes) => {
                trace!(track_id = %self.track_id, offset = self.position, len, "Served chunk from cache");
                self.position += len;
                Ok(Some(bytes))
            }
            // Evicted between the span lookup and the read.
            CacheRead::Miss => Ok(None),
        }
    }

    async fn fetch(&mut self, remaining: Option<u64>) -> Result<Option<Bytes>> {
        let mut request_len = self.chunk_size;
        if let Some(next_cached) = self.cache.next_cached_offset(&self.track_id, self.position) {
            request_len = request_len.min(next_cached - self.position);
        }
        if let Some(remaining) = remaining {
            request_len = request_len.min(remaining);
        }

        let fetched = core_async::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PlaybackError::Cancelled),
            result = self.transport.fetch_range(&self.track_id, self.position, request_len) => result?,
        };

        // A response that lands after cancellation must not be delivered.
        if self.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }

        if let Some(total) = fetched.total_length {
            if self.content_length != Some(total) {
                self.content_length = Some(total);
                self.cache.set_content_length(&self.track_id, total);
            }
        }

        if fetched.is_end() {
            debug!(track_id = %self.track_id, position = self.position, "Track stream reached end");
            self.finished = true;
            return Ok(None);
        }

        let mut data = fetched.data;
        if data.len() as u64 > request_len {
            data.truncate(request_len as usize);
        }

        let offset = self.position;
        self.position += data.len() as u64;
        trace!(track_id = %self.track_id, offset, len = data.len(), "Fetched chunk from transport");

        if self.write_back {
            let cache = self.cache.clone();
            let track_id = self.track_id.clone();
            let chunk = data.clone();
            core_async::spawn(async move {
                if let Err(e) = cache.write(&track_id, offset, chunk) {
                    warn!(track_id = %track_id, offset, error = %e, "Cache write-back failed");
                }
            });
        }

        Ok(Some(data))
    }

    /// Adapt into a `futures::Stream`. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), stream)),
                Ok(None) => None,
                Err(e) => {
                    stream.finished = true;
                    Some((Err(e), stream))
                }
            }
        })
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("track_id", &self.track_id)
            .field("position", &self.position)
            .field("content_length", &self.content_length)
            .field("finished", &self.finished)
            .finish()
    }
}
