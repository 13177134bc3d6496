//! Handle acquisition for UI processes.
//!
//! A UI never owns the player. It asks the [`ServiceBinder`] for a
//! [`PlayerHandle`] when it comes up and gives it back when it goes away.
//! The binder outlives any single UI; the service binds it once started and
//! unbinds it on shutdown. `attach()` returning `None` means "not available
//! yet", never an error.

use crate::playlists::BuiltInPlaylist;
use crate::Result;
use core_async::sync::watch;
use core_library::{Track, TrackList};
use core_playback::{ContentCache, PlaybackController, PlaybackSnapshot};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What an attached UI gets: the controller, the cache and the UI intents
/// built on top of them.
#[derive(Clone)]
pub struct PlayerHandle {
    controller: PlaybackController,
    cache: Arc<ContentCache>,
    playlists: Arc<HashMap<BuiltInPlaylist, watch::Receiver<TrackList>>>,
}

impl PlayerHandle {
    pub(crate) fn new(
        controller: PlaybackController,
        cache: Arc<ContentCache>,
        playlists: HashMap<BuiltInPlaylist, watch::Receiver<TrackList>>,
    ) -> Self {
        Self {
            controller,
            cache,
            playlists: Arc::new(playlists),
        }
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.controller.subscribe()
    }

    /// Live contents of a built-in playlist, if the service maintains it.
    pub fn playlist(&self, kind: BuiltInPlaylist) -> Option<watch::Receiver<TrackList>> {
        self.playlists.get(&kind).cloned()
    }

    /// Play a collection from its first track, ending any radio session.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn play_collection(&self, tracks: Vec<Track>) -> Result<()> {
        self.controller.stop_radio().await?;
        self.controller.force_play_from_beginning(tracks).await?;
        Ok(())
    }

    /// Play a shuffled copy of a collection, ending any radio session.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn shuffle_collection(&self, mut tracks: Vec<Track>) -> Result<()> {
        tracks.shuffle(&mut rand::thread_rng());
        self.controller.stop_radio().await?;
        self.controller.force_play_from_beginning(tracks).await?;
        Ok(())
    }

    /// Play a collection starting at `index`, ending any radio session.
    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    pub async fn play_collection_at(&self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.controller.stop_radio().await?;
        self.controller.force_play_at_index(tracks, index).await?;
        Ok(())
    }

    pub async fn enqueue_collection(&self, tracks: Vec<Track>) -> Result<usize> {
        Ok(self.controller.enqueue(tracks).await?)
    }

    /// Whether every byte of `track` is resident. Cheap enough to poll per
    /// list row.
    pub fn is_offline_available(&self, track: &Track) -> bool {
        self.cache.is_track_fully_cached(track)
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("controller", &self.controller)
            .field("playlists", &self.playlists.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct BinderInner {
    handle: RwLock<Option<PlayerHandle>>,
    available: watch::Sender<bool>,
    observers: AtomicUsize,
}

/// Long-lived, cloneable slot through which UIs obtain a [`PlayerHandle`].
#[derive(Clone)]
pub struct ServiceBinder {
    inner: Arc<BinderInner>,
}

impl ServiceBinder {
    pub fn new() -> Self {
        let (available, _) = watch::channel(false);
        Self {
            inner: Arc::new(BinderInner {
                handle: RwLock::new(None),
                available,
                observers: AtomicUsize::new(0),
            }),
        }
    }

    /// Service side: publish the handle.
    pub fn bind(&self, handle: PlayerHandle) {
        *self.inner.handle.write() = Some(handle);
        self.inner.available.send_replace(true);
        info!("Player service bound");
    }

    /// Service side: withdraw the handle. Handles already attached keep
    /// working until the controller shuts down.
    pub fn unbind(&self) -> Option<PlayerHandle> {
        let previous = self.inner.handle.write().take();
        self.inner.available.send_replace(false);
        if previous.is_some() {
            info!(
                observers = self.observer_count(),
                "Player service unbound"
            );
        }
        previous
    }

    /// UI side: obtain the handle, or `None` while the service is not bound.
    pub fn attach(&self) -> Option<PlayerHandle> {
        let handle = self.inner.handle.read().clone()?;
        let observers = self.inner.observers.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(observers, "Observer attached");
        Some(handle)
    }

    /// UI side: give back an attached handle.
    pub fn detach(&self, handle: PlayerHandle) {
        drop(handle);
        let previous = self
            .inner
            .observers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        debug!(observers = previous.saturating_sub(1), "Observer detached");
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.load(Ordering::SeqCst)
    }

    pub fn is_available(&self) -> bool {
        *self.inner.available.borrow()
    }

    /// Availability changes; the current value is `is_available()`.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.available.subscribe()
    }
}

impl Default for ServiceBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBinder")
            .field("available", &self.is_available())
            .field("observers", &self.observer_count())
            .finish()
    }
}
