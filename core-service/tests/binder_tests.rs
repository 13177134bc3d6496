//! Service bootstrap, the binder and the UI intents on `PlayerHandle`.

use async_trait::async_trait;
use bridge_traits::database::DatabaseAdapter;
use bytes::Bytes;
use core_library::adapters::SqliteAdapter;
use core_library::{InMemoryLibrary, LibrarySource, Track, TrackId, TrackList};
use core_playback::traits::{
    AudioTransport, ContinuationCursor, FetchedChunk, RadioBatch, RadioSource,
};
use core_playback::{PlaybackSnapshot, Result as PlaybackResult, TransportState};
use core_runtime::config::CoreConfig;
use core_service::{
    BuiltInPlaylist, CoreError, PlayerService, ServiceBinder, ServiceDependencies,
};
use std::sync::Arc;
use std::time::Duration;

const TRACK_BYTES: u64 = 8;

/// Every track is `TRACK_BYTES` of zeros.
struct ZeroTransport;

#[async_trait]
impl AudioTransport for ZeroTransport {
    async fn fetch_range(
        &self,
        _track_id: &TrackId,
        offset: u64,
        max_len: u64,
    ) -> PlaybackResult<FetchedChunk> {
        if offset >= TRACK_BYTES {
            return Ok(FetchedChunk::end(Some(TRACK_BYTES)));
        }
        let len = max_len.min(TRACK_BYTES - offset) as usize;
        Ok(FetchedChunk::new(Bytes::from(vec![0u8; len]), Some(TRACK_BYTES)))
    }
}

/// Endless recommendations, one track per batch.
struct EndlessRadio;

#[async_trait]
impl RadioSource for EndlessRadio {
    async fn fetch_batch(
        &self,
        seed: &TrackId,
        _cursor: &ContinuationCursor,
        _limit: usize,
    ) -> PlaybackResult<RadioBatch> {
        Ok(RadioBatch::new(
            vec![track(&format!("{}-radio", seed))],
            Some("more".to_string()),
        ))
    }
}

fn track(id: &str) -> Track {
    Track::new(id, Duration::from_secs(30)).with_content_length(TRACK_BYTES)
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

fn config() -> CoreConfig {
    CoreConfig::builder()
        .cache_size_mb(1)
        .build()
        .expect("valid config")
}

fn deps(library: Arc<InMemoryLibrary>) -> ServiceDependencies {
    ServiceDependencies::new(library).with_transport(Arc::new(ZeroTransport))
}

async fn wait_until<T, F>(rx: &mut tokio::sync::watch::Receiver<T>, pred: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("condition not reached in time")
        .expect("sender dropped")
        .clone()
}

async fn wait_snapshot<F>(rx: &mut tokio::sync::watch::Receiver<PlaybackSnapshot>, pred: F)
where
    F: FnMut(&PlaybackSnapshot) -> bool,
{
    wait_until(rx, pred).await;
}

fn ids(list: &TrackList) -> Vec<&str> {
    list.iter().map(|t| t.id().as_str()).collect()
}

// ============================================================================
// Binder
// ============================================================================

#[tokio::test]
async fn test_attach_before_bind_returns_none() {
    let binder = ServiceBinder::new();
    assert!(!binder.is_available());
    assert!(binder.attach().is_none());
    assert_eq!(binder.observer_count(), 0);
}

#[tokio::test]
async fn test_attach_and_detach_track_observers() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();

    assert!(binder.is_available());
    let first = binder.attach().expect("bound");
    let second = binder.attach().expect("bound");
    assert_eq!(binder.observer_count(), 2);

    binder.detach(first);
    binder.detach(second);
    assert_eq!(binder.observer_count(), 0);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_detach_never_underflows() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();

    let handle = binder.attach().unwrap();
    binder.detach(handle.clone());
    binder.detach(handle);
    assert_eq!(binder.observer_count(), 0);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_unbinds_and_stops_controller() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();
    let mut availability = binder.watch();
    assert!(*availability.borrow_and_update());
    let handle = binder.attach().unwrap();

    service.shutdown().await.unwrap();

    assert!(!binder.is_available());
    assert!(binder.attach().is_none());
    assert!(availability.has_changed().unwrap());
    assert!(!*availability.borrow_and_update());
    assert!(handle.play_collection(tracks(&["a"])).await.is_err());
    assert!(!handle.controller().is_running());

    // Second shutdown is a no-op.
    service.shutdown().await.unwrap();
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_start_without_transport_or_client_is_capability_missing() {
    let mut config = config();
    config.http_client = None;
    let library = Arc::new(InMemoryLibrary::new());

    let err = PlayerService::start(config, ServiceDependencies::new(library))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[tokio::test]
async fn test_start_without_url_resolver_is_capability_missing() {
    let library = Arc::new(InMemoryLibrary::new());
    // Default config carries the desktop HTTP client; the resolver is what's missing.
    let err = PlayerService::start(config(), ServiceDependencies::new(library))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CapabilityMissing { .. }));
}

#[tokio::test]
async fn test_playlists_can_be_disabled() {
    let config = CoreConfig::builder()
        .cache_size_mb(1)
        .enable_builtin_playlists(false)
        .build()
        .unwrap();
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config, deps(library)).await.unwrap();

    assert!(service.playlist(BuiltInPlaylist::Favorites).is_none());
    assert!(binder
        .attach()
        .unwrap()
        .playlist(BuiltInPlaylist::Cached)
        .is_none());

    service.shutdown().await.unwrap();
}

// ============================================================================
// Handle intents
// ============================================================================

#[tokio::test]
async fn test_play_collection_stops_radio() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(
        config(),
        deps(library).with_radio_source(Arc::new(EndlessRadio)),
    )
    .await
    .unwrap();
    let player = binder.attach().unwrap();
    let mut snapshots = player.subscribe();

    player.play_collection(tracks(&["seed"])).await.unwrap();
    player
        .controller()
        .start_radio(TrackId::from("seed"))
        .await
        .unwrap();
    assert!(player.snapshot().radio_active);

    player.play_collection(tracks(&["x", "y"])).await.unwrap();
    let snapshot = player.snapshot();
    assert!(!snapshot.radio_active);
    assert_eq!(snapshot.current_track, Some(TrackId::from("x")));
    wait_snapshot(&mut snapshots, |s| s.transport == TransportState::Playing).await;

    binder.detach(player);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_play_collection_at_and_enqueue() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();
    let player = binder.attach().unwrap();

    player
        .play_collection_at(tracks(&["a", "b", "c"]), 2)
        .await
        .unwrap();
    assert_eq!(player.snapshot().current_index, Some(2));

    let len = player.enqueue_collection(tracks(&["d", "e"])).await.unwrap();
    assert_eq!(len, 5);
    assert_eq!(player.snapshot().current_track, Some(TrackId::from("c")));

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shuffle_collection_plays_every_track() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();
    let player = binder.attach().unwrap();

    player
        .shuffle_collection(tracks(&["a", "b", "c", "d"]))
        .await
        .unwrap();
    let snapshot = player.snapshot();
    let mut queued: Vec<_> = snapshot
        .queue
        .iter()
        .map(|item| item.track().id().as_str().to_string())
        .collect();
    queued.sort();
    assert_eq!(queued, vec!["a", "b", "c", "d"]);
    assert_eq!(snapshot.current_index, Some(0));

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_offline_availability_follows_the_cache() {
    let library = Arc::new(InMemoryLibrary::new());
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();
    let player = binder.attach().unwrap();
    let song = track("song");

    assert!(!player.is_offline_available(&song));
    player
        .cache()
        .write(song.id(), 0, Bytes::from_static(&[1, 2, 3, 4]))
        .unwrap();
    assert!(!player.is_offline_available(&song));
    player
        .cache()
        .write(song.id(), 4, Bytes::from_static(&[5, 6, 7, 8]))
        .unwrap();
    assert!(player.is_offline_available(&song));

    service.shutdown().await.unwrap();
}

// ============================================================================
// Built-in playlists
// ============================================================================

#[tokio::test]
async fn test_favorites_playlist_follows_library() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_track(track("a")).unwrap();
    library.add_track(track("b")).unwrap();
    let (service, _binder) = PlayerService::start(config(), deps(library.clone()))
        .await
        .unwrap();
    let mut favorites = service.playlist(BuiltInPlaylist::Favorites).unwrap();
    assert!(favorites.borrow().is_empty());

    library.set_favorite(&TrackId::from("a"), true).unwrap();
    let list = wait_until(&mut favorites, |list| list.len() == 1).await;
    assert_eq!(ids(&list), vec!["a"]);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cached_playlist_updates_on_cache_writes() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_track(track("old")).unwrap();
    library.add_track(track("new")).unwrap();
    let (service, _binder) = PlayerService::start(config(), deps(library.clone()))
        .await
        .unwrap();
    let mut cached = service.playlist(BuiltInPlaylist::Cached).unwrap();
    assert!(cached.borrow().is_empty());

    let cache = service.cache();
    cache
        .write(&TrackId::from("old"), 0, Bytes::from(vec![0u8; 8]))
        .unwrap();
    let list = wait_until(&mut cached, |list| list.len() == 1).await;
    assert_eq!(ids(&list), vec!["old"]);

    cache
        .write(&TrackId::from("new"), 0, Bytes::from(vec![0u8; 8]))
        .unwrap();
    let list = wait_until(&mut cached, |list| list.len() == 2).await;
    // Most recently added first.
    assert_eq!(ids(&list), vec!["new", "old"]);

    cache.remove(&TrackId::from("old"));
    library.remove_track(&TrackId::from("new")).unwrap();
    wait_until(&mut cached, |list| list.is_empty()).await;

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_playing_a_track_makes_it_available_offline() {
    let library = Arc::new(InMemoryLibrary::new());
    library.add_track(track("song")).unwrap();
    let (service, binder) = PlayerService::start(config(), deps(library)).await.unwrap();
    let player = binder.attach().unwrap();
    let mut cached = player.playlist(BuiltInPlaylist::Cached).unwrap();

    player.play_collection(vec![track("song")]).await.unwrap();
    let list = wait_until(&mut cached, |list| list.len() == 1).await;
    assert!(player.is_offline_available(&list[0]));

    service.shutdown().await.unwrap();
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_cache_survives_restart() {
    let mut adapter = SqliteAdapter::in_memory().await.unwrap();
    adapter.initialize().await.unwrap();
    let database: Arc<dyn DatabaseAdapter> = Arc::new(adapter);

    let mut config = config();
    config.features.enable_cache_persistence = true;
    let library: Arc<dyn LibrarySource> = Arc::new(InMemoryLibrary::new());
    let song = track("kept");

    let (service, _binder) = PlayerService::start(
        config.clone(),
        ServiceDependencies::new(library.clone())
            .with_transport(Arc::new(ZeroTransport))
            .with_database(database.clone()),
    )
    .await
    .unwrap();
    service
        .cache()
        .write(song.id(), 0, Bytes::from(vec![7u8; 8]))
        .unwrap();
    service.shutdown().await.unwrap();

    let (restarted, binder) = PlayerService::start(
        config,
        ServiceDependencies::new(library)
            .with_transport(Arc::new(ZeroTransport))
            .with_database(database),
    )
    .await
    .unwrap();
    assert!(binder.attach().unwrap().is_offline_available(&song));
    assert_eq!(restarted.cache().resident_bytes(), 8);

    restarted.shutdown().await.unwrap();
}
