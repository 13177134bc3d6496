//! Built-in playlists derived from the library and the content cache.
//!
//! ```text
//! LibrarySource ──re-emit──┐
//!                          ├──> view task ──> watch::Receiver<TrackList>
//! CacheEvent (Cached) ─────┘
//! ```
//!
//! `Favorites` mirrors the library's favorites query. `Cached` takes songs by
//! most-recently-added and keeps those whose bytes are fully resident, so it
//! also re-evaluates when the cache writes or evicts.

use core_async::sync::{broadcast, watch, CancellationToken};
use core_async::task::JoinHandle;
use core_library::{LibrarySource, TrackList};
use core_playback::ContentCache;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInPlaylist {
    Favorites,
    Cached,
}

impl BuiltInPlaylist {
    pub const ALL: [BuiltInPlaylist; 2] = [BuiltInPlaylist::Favorites, BuiltInPlaylist::Cached];

    pub fn title(&self) -> &'static str {
        match self {
            BuiltInPlaylist::Favorites => "Favorites",
            BuiltInPlaylist::Cached => "Available offline",
        }
    }

    fn source(&self, library: &dyn LibrarySource) -> watch::Receiver<TrackList> {
        match self {
            BuiltInPlaylist::Favorites => library.favorites(),
            BuiltInPlaylist::Cached => library.songs_by_recently_added(),
        }
    }

    fn evaluate(&self, tracks: &TrackList, cache: &ContentCache) -> TrackList {
        match self {
            BuiltInPlaylist::Favorites => tracks.clone(),
            BuiltInPlaylist::Cached => tracks
                .iter()
                .filter(|track| cache.is_track_fully_cached(track))
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for BuiltInPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A live built-in playlist backed by one background task.
pub struct BuiltInPlaylistView {
    kind: BuiltInPlaylist,
    tracks: watch::Receiver<TrackList>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl BuiltInPlaylistView {
    /// Evaluate once and keep re-evaluating until shut down.
    ///
    /// `events` only matters for `Cached`; without it the view follows the
    /// library alone.
    pub fn spawn(
        kind: BuiltInPlaylist,
        library: Arc<dyn LibrarySource>,
        cache: Arc<ContentCache>,
        events: Option<&EventBus>,
    ) -> Self {
        let mut source = kind.source(library.as_ref());
        let initial = kind.evaluate(&source.borrow_and_update(), &cache);
        let (tx, tracks) = watch::channel(initial);

        let cache_events = match kind {
            BuiltInPlaylist::Cached => events.map(EventBus::subscribe),
            BuiltInPlaylist::Favorites => None,
        };
        let cancel = CancellationToken::new();
        let task = core_async::spawn(run(
            kind,
            source,
            cache,
            cache_events,
            tx,
            cancel.clone(),
        ));

        Self {
            kind,
            tracks,
            cancel,
            task,
        }
    }

    pub fn kind(&self) -> BuiltInPlaylist {
        self.kind
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackList> {
        self.tracks.clone()
    }

    pub fn current(&self) -> TrackList {
        self.tracks.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl fmt::Debug for BuiltInPlaylistView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltInPlaylistView")
            .field("kind", &self.kind)
            .field("len", &self.tracks.borrow().len())
            .finish()
    }
}

async fn run(
    kind: BuiltInPlaylist,
    mut source: watch::Receiver<TrackList>,
    cache: Arc<ContentCache>,
    mut cache_events: Option<broadcast::Receiver<CoreEvent>>,
    tx: watch::Sender<TrackList>,
    cancel: CancellationToken,
) {
    debug!(playlist = %kind, "Built-in playlist view started");
    loop {
        core_async::select! {
            _ = cancel.cancelled() => break,
            changed = source.changed() => {
                if changed.is_err() {
                    debug!(playlist = %kind, "Library source closed");
                    break;
                }
            }
            relevant = next_cache_change(&mut cache_events) => {
                if !relevant {
                    continue;
                }
            }
        }

        let evaluated = kind.evaluate(&source.borrow_and_update(), &cache);
        tx.send_if_modified(|current| {
            if current[..] == evaluated[..] {
                return false;
            }
            trace!(playlist = %kind, len = evaluated.len(), "Built-in playlist updated");
            *current = evaluated;
            true
        });
    }
    debug!(playlist = %kind, "Built-in playlist view stopped");
}

/// Wait for a cache event that can change residency. Pending forever when
/// there is no event feed.
async fn next_cache_change(events: &mut Option<broadcast::Receiver<CoreEvent>>) -> bool {
    let Some(receiver) = events.as_mut() else {
        return std::future::pending().await;
    };
    match receiver.recv().await {
        Ok(CoreEvent::Cache(
            CacheEvent::RangeWritten { .. }
            | CacheEvent::Evicted { .. }
            | CacheEvent::Restored { .. },
        )) => true,
        Ok(_) => false,
        // Missed some events; re-evaluate to be current again.
        Err(broadcast::error::RecvError::Lagged(_)) => true,
        Err(broadcast::error::RecvError::Closed) => {
            *events = None;
            false
        }
    }
}
