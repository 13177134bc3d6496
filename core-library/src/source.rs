//! Reactive library queries.
//!
//! The playback service never writes to the library. It only observes
//! collections that re-emit whenever the underlying store changes, the same
//! way a UI would bind to a live query.

use crate::error::{LibraryError, Result};
use crate::models::{Track, TrackId};
use core_async::sync::watch;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Immutable snapshot of a track collection.
pub type TrackList = Arc<[Track]>;

/// Read-only, re-emitting track collections.
///
/// Each call returns a fresh receiver whose current value is the latest
/// evaluation of the query; `changed()` resolves on every re-evaluation.
pub trait LibrarySource: Send + Sync {
    /// All favorited tracks.
    fn favorites(&self) -> watch::Receiver<TrackList>;

    /// All tracks, most recently added first.
    fn songs_by_recently_added(&self) -> watch::Receiver<TrackList>;
}

#[derive(Default)]
struct LibraryState {
    /// Insertion order, oldest first.
    tracks: Vec<Track>,
    favorites: HashSet<TrackId>,
}

impl LibraryState {
    fn recently_added(&self) -> TrackList {
        self.tracks.iter().rev().cloned().collect()
    }

    fn favorite_tracks(&self) -> TrackList {
        self.tracks
            .iter()
            .rev()
            .filter(|t| self.favorites.contains(t.id()))
            .cloned()
            .collect()
    }
}

/// In-process library used by hosts without a relational store and by tests.
pub struct InMemoryLibrary {
    state: Mutex<LibraryState>,
    favorites_tx: watch::Sender<TrackList>,
    recent_tx: watch::Sender<TrackList>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        let empty: TrackList = Arc::from(Vec::new());
        let (favorites_tx, _) = watch::channel(empty.clone());
        let (recent_tx, _) = watch::channel(empty);
        Self {
            state: Mutex::new(LibraryState::default()),
            favorites_tx,
            recent_tx,
        }
    }

    /// Adds a track as the most recently added one.
    ///
    /// Re-adding an existing id replaces the stored track and moves it to
    /// the front.
    pub fn add_track(&self, track: Track) -> Result<()> {
        track.validate().map_err(|message| LibraryError::InvalidInput {
            field: "track".to_string(),
            message,
        })?;

        let mut state = self.state.lock();
        state.tracks.retain(|t| t.id() != track.id());
        debug!(track_id = %track.id(), "Track added to library");
        state.tracks.push(track);
        self.publish(&state);
        Ok(())
    }

    pub fn remove_track(&self, track_id: &TrackId) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.tracks.len();
        state.tracks.retain(|t| t.id() != track_id);
        if state.tracks.len() == before {
            return Err(LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: track_id.to_string(),
            });
        }
        state.favorites.remove(track_id);
        self.publish(&state);
        Ok(())
    }

    pub fn set_favorite(&self, track_id: &TrackId, favorite: bool) -> Result<()> {
        let mut state = self.state.lock();
        if !state.tracks.iter().any(|t| t.id() == track_id) {
            return Err(LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: track_id.to_string(),
            });
        }
        let changed = if favorite {
            state.favorites.insert(track_id.clone())
        } else {
            state.favorites.remove(track_id)
        };
        if changed {
            self.publish(&state);
        }
        Ok(())
    }

    fn publish(&self, state: &LibraryState) {
        self.recent_tx.send_replace(state.recently_added());
        self.favorites_tx.send_replace(state.favorite_tracks());
    }
}

impl Default for InMemoryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl LibrarySource for InMemoryLibrary {
    fn favorites(&self) -> watch::Receiver<TrackList> {
        self.favorites_tx.subscribe()
    }

    fn songs_by_recently_added(&self) -> watch::Receiver<TrackList> {
        self.recent_tx.subscribe()
    }
}
