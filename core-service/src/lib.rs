//! Player service façade.
//!
//! Wires the host's collaborators (library, transport or HTTP client, radio
//! source, audio sink, database) into one running [`PlayerService`] and hands
//! out [`PlayerHandle`]s to UIs through a [`ServiceBinder`].
//!
//! ```no_run
//! # async fn example(library: std::sync::Arc<dyn core_library::LibrarySource>)
//! #     -> core_service::Result<()> {
//! use core_library::TrackId;
//! use core_runtime::config::CoreConfig;
//! use core_service::{PlayerService, ServiceDependencies};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder().cache_size_mb(512).build()?;
//! let deps = ServiceDependencies::new(library)
//!     .with_url_resolver(Arc::new(|id: &TrackId| format!("https://cdn.example/audio/{}", id)));
//! let (service, binder) = PlayerService::start(config, deps).await?;
//!
//! if let Some(player) = binder.attach() {
//!     player.play_collection(Vec::new()).await?;
//!     binder.detach(player);
//! }
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod error;
pub mod playlists;
pub mod service;

pub use binder::{PlayerHandle, ServiceBinder};
pub use error::{CoreError, Result};
pub use playlists::{BuiltInPlaylist, BuiltInPlaylistView};
pub use service::{PlayerService, ServiceDependencies};
