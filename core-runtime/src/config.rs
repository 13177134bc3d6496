//! # Core Configuration Module
//!
//! Provides configuration management for the playback service.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host-provided bridges and the service-level
//! settings (cache budget, durable store location, feature flags). It enforces
//! fail-fast validation so that a misconfigured host learns about it at
//! start-up rather than on the first play request.
//!
//! ## Dependencies
//!
//! - `HttpClient` - Network transport for audio bytes (desktop default: reqwest)
//! - `Clock` - Time source for cache last-access stamps (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, a reqwest-backed `HttpClient`
//! is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DatabaseLocation};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database(DatabaseLocation::file("/data/cache.db"))
//!     .cache_size_mb(512)
//!     .http_client(Arc::new(MyHttpClient))
//!     .enable_radio(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates dependencies and values and returns actionable
//! messages:
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let result = CoreConfig::builder()
//!     .cache_size_mb(0)
//!     .build();
//! assert!(result.is_err());
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, HttpClient, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound for the content cache budget.
pub const MAX_CACHE_SIZE_MB: u64 = 100_000;

/// Default content cache budget (256 MB).
pub const DEFAULT_CACHE_SIZE_MB: u64 = 256;

/// Where the durable cache store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Private in-memory database; contents vanish with the process.
    InMemory,
    /// SQLite file on disk.
    File(PathBuf),
}

impl DatabaseLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Returns `true` if the location survives a restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Core configuration for the playback service.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Durable store for the content cache
    pub database: DatabaseLocation,

    /// Maximum resident bytes in the content cache, in megabytes
    pub cache_size_mb: u64,

    /// HTTP client used by the range transport
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Time source for cache last-access stamps
    pub clock: Arc<dyn Clock>,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database", &self.database)
            .field("cache_size_mb", &self.cache_size_mb)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Allow radio continuation when the queue runs low
    pub enable_radio: bool,

    /// Mirror cache writes into the durable store and restore them on start
    pub enable_cache_persistence: bool,

    /// Maintain the Favorites and Cached built-in playlists
    pub enable_builtin_playlists: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_radio: true,
            enable_cache_persistence: false,
            enable_builtin_playlists: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Cache budget in bytes.
    pub fn cache_max_bytes(&self) -> u64 {
        self.cache_size_mb * 1024 * 1024
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Cache size is reasonable (> 0 and <= 100GB)
    /// - The event buffer is not empty
    /// - Feature flags are consistent with the chosen store
    pub fn validate(&self) -> Result<()> {
        if self.cache_size_mb == 0 {
            return Err(Error::Config(
                "Cache size must be greater than 0 MB".to_string(),
            ));
        }

        if self.cache_size_mb > MAX_CACHE_SIZE_MB {
            return Err(Error::Config(format!(
                "Cache size exceeds maximum of {} MB",
                MAX_CACHE_SIZE_MB
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_cache_persistence && !self.database.is_durable() {
            return Err(Error::Config(
                "Cache persistence enabled but the database is in-memory. \
                 Use .database(DatabaseLocation::file(..)) or disable the feature."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Default reqwest client could not be created: {}", e),
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

/// Error returned by consumers that need an HTTP client and found none.
pub fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided for the range transport. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform-native adapter, or supply an AudioTransport directly."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    cache_size_mb: Option<u64>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the durable store location.
    ///
    /// ```
    /// use core_runtime::config::{CoreConfig, DatabaseLocation};
    ///
    /// let builder = CoreConfig::builder().database(DatabaseLocation::file("/data/cache.db"));
    /// ```
    pub fn database(mut self, location: DatabaseLocation) -> Self {
        self.database = Some(location);
        self
    }

    /// Shorthand for a file-backed store.
    pub fn database_path<P: Into<PathBuf>>(self, path: P) -> Self {
        self.database(DatabaseLocation::File(path.into()))
    }

    /// Sets the content cache budget in megabytes.
    pub fn cache_size_mb(mut self, size_mb: u64) -> Self {
        self.cache_size_mb = Some(size_mb);
        self
    }

    /// Sets the HTTP client used to fetch audio ranges.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Overrides the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the per-subscriber event buffer.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables radio continuation.
    pub fn enable_radio(mut self, enabled: bool) -> Self {
        self.features.enable_radio = enabled;
        self
    }

    /// Enables or disables durable cache persistence.
    pub fn enable_cache_persistence(mut self, enabled: bool) -> Self {
        self.features.enable_cache_persistence = enabled;
        self
    }

    /// Enables or disables the built-in playlists.
    pub fn enable_builtin_playlists(mut self, enabled: bool) -> Self {
        self.features.enable_builtin_playlists = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with the chosen store
    /// - The desktop default HTTP client cannot be created
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            database: self.database.unwrap_or(DatabaseLocation::InMemory),
            cache_size_mb: self.cache_size_mb.unwrap_or(DEFAULT_CACHE_SIZE_MB),
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
