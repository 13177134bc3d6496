//! Domain models for the music library
//!
//! `Track` is immutable once constructed: the builder-style `with_*` methods
//! consume the value and return a new one, and no setter exists. Queue
//! items, cache entries and playlist snapshots therefore share tracks
//! freely by clone.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// ID Types
// =============================================================================

/// Stable, globally unique track identifier.
///
/// Opaque to the core: it is whatever the catalog assigned, and is used as
/// the cache key and in events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Track
// =============================================================================

/// Presentation metadata, opaque to the playback core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,
    /// Display artist
    pub artist: Option<String>,
    /// Thumbnail image URL
    pub thumbnail_url: Option<String>,
}

impl TrackMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A playable track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    id: TrackId,
    duration: Duration,
    /// Declared size of the audio payload; unknown until the first fetch.
    content_length: Option<u64>,
    metadata: TrackMetadata,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
            content_length: None,
            metadata: TrackMetadata::default(),
        }
    }

    /// Returns a copy carrying the given declared content length.
    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
        self
    }

    /// Returns a copy carrying the given metadata.
    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> &TrackId {
        &self.id
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.duration.is_zero() {
            return Err("Track duration must be positive".to_string());
        }

        if self.content_length == Some(0) {
            return Err("Declared content length must be positive".to_string());
        }

        Ok(())
    }
}
