//! # Playback Error Types
//!
//! Error types for the cache, stream, queue, radio and transport layers.
//!
//! Two outcomes that look like failures are deliberately not errors here:
//! a cache miss is [`CacheRead::Miss`](crate::cache::CacheRead), and an
//! exhausted radio source is reported as an event while the session
//! deactivates itself.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Zero-length or overflowing byte range.
    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    /// A single write larger than the whole cache budget.
    #[error("Cache full: {requested} bytes requested, capacity {capacity}")]
    CacheFull { requested: u64, capacity: u64 },

    /// Cache persistence or restore failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Track is not available in the cache.
    #[error("Track not cached: {0}")]
    NotCached(String),

    // ========================================================================
    // Streaming Errors
    // ========================================================================
    /// Network streaming failed.
    #[error("Streaming failed: {0}")]
    StreamingFailed(String),

    /// Audio source is unavailable (e.g., network down, unknown track).
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    /// The stream was cancelled before it produced a result.
    #[error("Stream cancelled")]
    Cancelled,

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Cursor is already on the last item.
    #[error("End of queue")]
    EndOfQueue,

    /// Cursor is already on the first item.
    #[error("Start of queue")]
    StartOfQueue,

    #[error("Index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Queue is empty")]
    EmptyQueue,

    // ========================================================================
    // Radio Errors
    // ========================================================================
    /// Fetching a continuation batch failed; radio state is unchanged.
    #[error("Radio fetch failed: {0}")]
    RadioFetchFailed(String),

    /// No radio source is configured, or radio is switched off.
    #[error("Radio is disabled")]
    RadioDisabled,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: String, action: String },

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Seek position is out of bounds.
    #[error("Seek position out of bounds: {0:?}")]
    SeekOutOfBounds(Duration),

    // ========================================================================
    // Controller Errors
    // ========================================================================
    /// The controller actor has stopped.
    #[error("Playback controller has shut down")]
    ControllerShutdown,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    LibraryError(#[from] core_library::error::LibraryError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_)
                | PlaybackError::SourceUnavailable(_)
                | PlaybackError::RadioFetchFailed(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_)
                | PlaybackError::SourceUnavailable(_)
                | PlaybackError::RadioFetchFailed(_)
        )
    }

    /// Returns `true` for queue navigation at a boundary, which the UI
    /// renders as "no next/previous track" rather than a failure.
    pub fn is_navigation_boundary(&self) -> bool {
        matches!(
            self,
            PlaybackError::EndOfQueue | PlaybackError::StartOfQueue | PlaybackError::EmptyQueue
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PlaybackError::StreamingFailed("reset".into()).is_transient());
        assert!(PlaybackError::StreamingFailed("reset".into()).is_network_error());
        assert!(!PlaybackError::InvalidRange("empty".into()).is_transient());

        assert!(PlaybackError::EndOfQueue.is_navigation_boundary());
        assert!(PlaybackError::StartOfQueue.is_navigation_boundary());
        assert!(!PlaybackError::IndexOutOfRange { index: 3, len: 2 }.is_navigation_boundary());
    }

    #[test]
    fn test_error_messages() {
        let err = PlaybackError::InvalidTransition {
            from: "idle".into(),
            action: "pause".into(),
        };
        assert_eq!(err.to_string(), "Cannot pause while idle");

        let err = PlaybackError::IndexOutOfRange { index: 5, len: 2 };
        assert_eq!(err.to_string(), "Index 5 out of range for queue of length 2");
    }
}
