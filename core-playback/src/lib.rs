//! # Playback Core
//!
//! Queue, transport and byte-range cache behind the music service.
//!
//! ## Overview
//!
//! This crate handles:
//! - A byte-range content cache with LRU eviction and optional persistence
//! - Track streams that prefer cached bytes and write fetched ones back
//! - The play queue and the radio continuation that keeps it growing
//! - The playback controller actor that ties them into one transport
//!
//! ## Layout
//!
//! ```text
//! PlaybackController ──> PlaybackQueue
//!        │          └──> RadioContinuation ──> RadioSource
//!        ▼
//!   TrackSource ──> ContentCache
//!        └────────> AudioTransport (HttpRangeTransport)
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
pub mod radio;
pub mod source;
pub mod traits;

pub use cache::{CacheConfig, CacheRead, CacheStats, ContentCache, EvictionPolicy};
pub use config::PlaybackConfig;
pub use controller::{
    PlaybackController, PlaybackControllerBuilder, PlaybackSnapshot, SkipOutcome, TransportState,
};
pub use error::{PlaybackError, Result};
pub use queue::{PlaybackQueue, QueueItem, QueueSlotId};
pub use radio::{RadioContinuation, RadioOutcome, RadioRequest, RadioSessionId, RadioState};
pub use source::{ByteStream, HttpRangeTransport, TrackSource, UrlResolver};
pub use traits::{
    AudioSink, AudioTransport, ContinuationCursor, FetchedChunk, NullSink, RadioBatch, RadioSource,
};
