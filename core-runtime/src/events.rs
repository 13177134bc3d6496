//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback service using `tokio::sync::broadcast`.
//! The controller, the content cache and the radio continuation publish typed events here;
//! UI observers and the built-in playlist views subscribe without ever touching the
//! state those components own.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for each domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    emit      ┌───────────┐
//! │ Controller   ├─────────────>│           │
//! └──────────────┘              │           │
//!                               │ EventBus  │
//! ┌──────────────┐    emit      │ (broadcast│    subscribe    ┌────────────┐
//! │ ContentCache ├─────────────>│  channel) ├────────────────>│ Subscriber │
//! └──────────────┘              │           │                 └────────────┘
//!                               │           │
//! ┌──────────────┐    emit      │           │    subscribe    ┌────────────┐
//! │ Radio        ├─────────────>│           ├────────────────>│ Subscriber │
//! └──────────────┘              └───────────┘                 └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Queue(QueueEvent::Appended { count: 3, len: 5 }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Event Types
//!
//! ### Playback Events
//! - `TransportChanged`: Transport state moved (e.g. buffering to playing)
//! - `TrackStarted`: A new current item began buffering
//! - `TrackFinished`: The current item played to its end
//! - `PositionChanged`: Seek or progress report
//! - `StreamFailed`: The current item cannot be played
//! - `Ended`: Queue exhausted with no continuation
//!
//! ### Queue Events
//! - `Replaced`, `Appended`, `InsertedNext`, `Shuffled`, `ItemRemoved`, `CursorMoved`, `Cleared`
//!
//! ### Radio Events
//! - `Started`, `Stopped`, `BatchAppended`, `FetchFailed`, `Exhausted`
//!
//! ### Cache Events
//! - `RangeWritten`, `Evicted`, `WriteRejected`, `Restored`
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers inside the core ignore the `Err` returned by [`EventBus::emit`] when
//! nobody is subscribed; the service runs fine with zero observers.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport and current-item events
    Playback(PlaybackEvent),
    /// Play queue mutations
    Queue(QueueEvent),
    /// Radio continuation lifecycle
    Radio(RadioEvent),
    /// Content cache population and eviction
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Radio(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::StreamFailed { .. }) => EventSeverity::Error,
            CoreEvent::Radio(RadioEvent::FetchFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::WriteRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackStarted { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Ended) => EventSeverity::Info,
            CoreEvent::Radio(RadioEvent::Started { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the playback transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Transport state changed.
    TransportChanged {
        /// Previous state (snake_case name).
        from: String,
        /// New state (snake_case name).
        to: String,
    },
    /// A new current item started buffering.
    TrackStarted {
        /// The track ID being played.
        track_id: String,
        /// Queue slot of the item.
        slot_id: u64,
    },
    /// The current item played to its end.
    TrackFinished {
        /// The track ID that completed.
        track_id: String,
    },
    /// Playback position changed (seek or progress report).
    PositionChanged {
        /// The track ID.
        track_id: String,
        /// New position (milliseconds).
        position_ms: u64,
        /// Track duration (milliseconds).
        duration_ms: u64,
    },
    /// The stream for the current item failed.
    StreamFailed {
        /// The track ID.
        track_id: String,
        /// Human-readable error message.
        message: String,
        /// Whether a retry could succeed.
        recoverable: bool,
    },
    /// Queue exhausted and no radio continuation was available.
    Ended,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TransportChanged { .. } => "Transport state changed",
            PlaybackEvent::TrackStarted { .. } => "Track started",
            PlaybackEvent::TrackFinished { .. } => "Track finished",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::StreamFailed { .. } => "Stream failed",
            PlaybackEvent::Ended => "Playback ended",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events related to play queue mutations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Queue contents were replaced.
    Replaced {
        /// New queue length.
        len: usize,
        /// New cursor position, if any.
        cursor: Option<usize>,
    },
    /// Items appended to the end.
    Appended {
        /// Number of items added.
        count: usize,
        /// New queue length.
        len: usize,
    },
    /// Items inserted right after the current item.
    InsertedNext {
        /// Number of items added.
        count: usize,
        /// New queue length.
        len: usize,
    },
    /// Queue order shuffled around the current item.
    Shuffled {
        /// Queue length.
        len: usize,
    },
    /// An item was removed.
    ItemRemoved {
        /// Index that was removed.
        index: usize,
        /// Cursor after re-anchoring.
        cursor: Option<usize>,
    },
    /// Cursor moved without changing contents.
    CursorMoved {
        /// New cursor position.
        index: usize,
    },
    /// Queue emptied.
    Cleared,
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Replaced { .. } => "Queue replaced",
            QueueEvent::Appended { .. } => "Tracks appended to queue",
            QueueEvent::InsertedNext { .. } => "Tracks queued to play next",
            QueueEvent::Shuffled { .. } => "Queue shuffled",
            QueueEvent::ItemRemoved { .. } => "Queue item removed",
            QueueEvent::CursorMoved { .. } => "Queue cursor moved",
            QueueEvent::Cleared => "Queue cleared",
        }
    }
}

// ============================================================================
// Radio Events
// ============================================================================

/// Events related to radio continuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RadioEvent {
    /// A radio session started.
    Started {
        /// Track that seeded the session.
        seed_track_id: String,
    },
    /// The radio session was stopped.
    Stopped,
    /// A continuation batch was appended to the queue.
    BatchAppended {
        /// Track that seeded the session.
        seed_track_id: String,
        /// Number of tracks appended.
        count: usize,
    },
    /// A continuation fetch failed; state unchanged.
    FetchFailed {
        /// Human-readable error message.
        message: String,
    },
    /// The continuation source ran dry; the session deactivated itself.
    Exhausted {
        /// Track that seeded the session.
        seed_track_id: String,
    },
}

impl RadioEvent {
    fn description(&self) -> &str {
        match self {
            RadioEvent::Started { .. } => "Radio started",
            RadioEvent::Stopped => "Radio stopped",
            RadioEvent::BatchAppended { .. } => "Radio tracks appended",
            RadioEvent::FetchFailed { .. } => "Radio fetch failed",
            RadioEvent::Exhausted { .. } => "Radio exhausted",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events related to the audio content cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A byte range became resident.
    RangeWritten {
        /// The track ID.
        track_id: String,
        /// Start offset of the written range.
        offset: u64,
        /// Length of the written range.
        len: u64,
    },
    /// An entry was evicted.
    Evicted {
        /// The track ID.
        track_id: String,
        /// Bytes reclaimed.
        bytes: u64,
    },
    /// A write was rejected; the cache is unchanged.
    WriteRejected {
        /// The track ID.
        track_id: String,
        /// Why the write was rejected.
        reason: String,
    },
    /// Entries were reloaded from the durable store.
    Restored {
        /// Number of entries restored.
        entries: usize,
        /// Bytes resident after restore.
        bytes: u64,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::RangeWritten { .. } => "Cache range written",
            CacheEvent::Evicted { .. } => "Cache entry evicted",
            CacheEvent::WriteRejected { .. } => "Cache write rejected",
            CacheEvent::Restored { .. } => "Cache restored",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let cache_events = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
