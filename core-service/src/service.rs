//! Bootstrap and lifetime of the player service.

use crate::binder::{PlayerHandle, ServiceBinder};
use crate::error::{CoreError, Result};
use crate::playlists::{BuiltInPlaylist, BuiltInPlaylistView};
use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
use core_async::sync::{watch, Mutex};
use core_async::task::JoinHandle;
use core_library::adapters::SqliteAdapter;
use core_library::repositories::{CacheSegmentRepository, SqliteCacheSegmentRepository};
use core_library::{LibrarySource, TrackList};
use core_playback::{
    AudioSink, AudioTransport, CacheConfig, ContentCache, HttpRangeTransport, PlaybackConfig,
    PlaybackController, RadioSource, TrackSource, UrlResolver,
};
use core_runtime::config::{http_client_missing_error, CoreConfig, DatabaseLocation};
use core_runtime::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Host-provided collaborators that `CoreConfig` does not carry.
pub struct ServiceDependencies {
    library: Arc<dyn LibrarySource>,
    transport: Option<Arc<dyn AudioTransport>>,
    url_resolver: Option<UrlResolver>,
    radio_source: Option<Arc<dyn RadioSource>>,
    sink: Option<Arc<dyn AudioSink>>,
    database: Option<Arc<dyn DatabaseAdapter>>,
    playback: PlaybackConfig,
}

impl ServiceDependencies {
    pub fn new(library: Arc<dyn LibrarySource>) -> Self {
        Self {
            library,
            transport: None,
            url_resolver: None,
            radio_source: None,
            sink: None,
            database: None,
            playback: PlaybackConfig::default(),
        }
    }

    /// Use this transport instead of building an HTTP one.
    pub fn with_transport(mut self, transport: Arc<dyn AudioTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Map track ids to URLs for the HTTP range transport.
    pub fn with_url_resolver(mut self, resolver: UrlResolver) -> Self {
        self.url_resolver = Some(resolver);
        self
    }

    pub fn with_radio_source(mut self, source: Arc<dyn RadioSource>) -> Self {
        self.radio_source = Some(source);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Durable store for cache persistence. The cache tables are created on
    /// start if missing.
    pub fn with_database(mut self, database: Arc<dyn DatabaseAdapter>) -> Self {
        self.database = Some(database);
        self
    }

    /// Chunking and radio tuning. `enable_radio` is still overridden by the
    /// feature flag.
    pub fn with_playback_config(mut self, config: PlaybackConfig) -> Self {
        self.playback = config;
        self
    }

    fn build_transport(&mut self, config: &CoreConfig) -> Result<Arc<dyn AudioTransport>> {
        if let Some(transport) = self.transport.take() {
            return Ok(transport);
        }
        let missing = |what: &str| CoreError::CapabilityMissing {
            capability: "AudioTransport".to_string(),
            message: format!(
                "No transport supplied and {}. {}",
                what,
                http_client_missing_error()
            ),
        };
        let client = config
            .http_client
            .clone()
            .ok_or_else(|| missing("no HTTP client configured"))?;
        let resolver = self
            .url_resolver
            .take()
            .ok_or_else(|| missing("no URL resolver supplied"))?;
        Ok(Arc::new(HttpRangeTransport::new(client, resolver)))
    }
}

impl std::fmt::Debug for ServiceDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDependencies")
            .field("transport", &self.transport.is_some())
            .field("url_resolver", &self.url_resolver.is_some())
            .field("radio_source", &self.radio_source.is_some())
            .field("sink", &self.sink.is_some())
            .field("database", &self.database.is_some())
            .field("playback", &self.playback)
            .finish()
    }
}

/// The running service: owns the controller task, the cache and the
/// built-in playlist views. UIs reach it through the [`ServiceBinder`].
pub struct PlayerService {
    controller: PlaybackController,
    controller_task: Mutex<Option<JoinHandle<()>>>,
    cache: Arc<ContentCache>,
    events: EventBus,
    binder: ServiceBinder,
    playlists: Mutex<HashMap<BuiltInPlaylist, BuiltInPlaylistView>>,
    playlist_feeds: HashMap<BuiltInPlaylist, watch::Receiver<TrackList>>,
}

impl PlayerService {
    /// Build every component, restore the cache if persistence is on, and
    /// bind the returned binder.
    #[instrument(skip_all, fields(cache_size_mb = config.cache_size_mb))]
    pub async fn start(
        config: CoreConfig,
        mut deps: ServiceDependencies,
    ) -> Result<(PlayerService, ServiceBinder)> {
        let transport = deps.build_transport(&config)?;
        let events = EventBus::new(config.event_buffer_size);

        let cache_config = CacheConfig::new()
            .with_max_bytes(config.cache_max_bytes())
            .with_persistence(config.features.enable_cache_persistence);
        let mut cache = ContentCache::new(cache_config)
            .with_event_bus(events.clone())
            .with_clock(config.clock.clone());

        let cache = if config.features.enable_cache_persistence {
            let database = match deps.database.take() {
                Some(database) => database,
                None => open_database(&config.database).await?,
            };
            let repository = SqliteCacheSegmentRepository::new(database);
            repository.initialize().await?;
            cache = cache.with_repository(Arc::new(repository));
            let cache = Arc::new(cache);
            // A damaged store costs a cold cache, not the service.
            if let Err(e) = cache.restore().await {
                warn!(error = %e, "Content cache restore failed");
            }
            cache
        } else {
            Arc::new(cache)
        };

        let playback = PlaybackConfig {
            enable_radio: config.features.enable_radio,
            ..deps.playback.clone()
        };
        let source = TrackSource::new(cache.clone(), transport, &playback);
        let mut builder = PlaybackController::builder(source)
            .config(playback)
            .event_bus(events.clone());
        if let Some(radio) = deps.radio_source.take() {
            builder = builder.radio_source(radio);
        }
        if let Some(sink) = deps.sink.take() {
            builder = builder.sink(sink);
        }
        let (controller, controller_task) = builder.spawn()?;

        let mut playlists = HashMap::new();
        if config.features.enable_builtin_playlists {
            for kind in BuiltInPlaylist::ALL {
                let view = BuiltInPlaylistView::spawn(
                    kind,
                    deps.library.clone(),
                    cache.clone(),
                    Some(&events),
                );
                playlists.insert(kind, view);
            }
        }
        let playlist_feeds: HashMap<_, _> = playlists
            .iter()
            .map(|(kind, view)| (*kind, view.subscribe()))
            .collect();

        let binder = ServiceBinder::new();
        binder.bind(PlayerHandle::new(
            controller.clone(),
            cache.clone(),
            playlist_feeds.clone(),
        ));

        info!(
            radio = config.features.enable_radio,
            persistence = config.features.enable_cache_persistence,
            playlists = playlists.len(),
            "Player service started"
        );

        let service = PlayerService {
            controller,
            controller_task: Mutex::new(Some(controller_task)),
            cache,
            events,
            binder: binder.clone(),
            playlists: Mutex::new(playlists),
            playlist_feeds,
        };
        Ok((service, binder))
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn binder(&self) -> &ServiceBinder {
        &self.binder
    }

    pub fn playlist(&self, kind: BuiltInPlaylist) -> Option<watch::Receiver<TrackList>> {
        self.playlist_feeds.get(&kind).cloned()
    }

    /// Unbind, stop the controller, stop the playlist views and flush the
    /// cache's write-behind queue. Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        self.binder.unbind();
        self.controller.shutdown().await?;
        if let Some(task) = self.controller_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Controller task ended abnormally");
            }
        }
        let views: Vec<_> = self.playlists.lock().await.drain().map(|(_, v)| v).collect();
        for view in views {
            view.shutdown().await;
        }
        self.cache.shutdown().await;
        info!("Player service stopped");
        Ok(())
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("controller", &self.controller)
            .field("binder", &self.binder)
            .finish()
    }
}

async fn open_database(location: &DatabaseLocation) -> Result<Arc<dyn DatabaseAdapter>> {
    let mut adapter = match location {
        DatabaseLocation::File(path) => SqliteAdapter::new(DatabaseConfig::new(path)).await?,
        DatabaseLocation::InMemory => SqliteAdapter::in_memory().await?,
    };
    adapter.initialize().await?;
    Ok(Arc::new(adapter))
}
