//! # Host Bridge Traits
//!
//! Capability traits the playback service consumes from its host.
//!
//! ## Overview
//!
//! The service core never talks to the network, the disk or the host logging
//! pipeline directly. Each of those is a trait defined here and implemented by
//! a platform crate (`bridge-desktop` on desktop, native adapters on mobile).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP used to fetch audio byte ranges
//!
//! ### Storage
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - Durable store backing the
//!   audio content cache
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! let http_client = config.http_client.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "HttpClient".to_string(),
//!     message: "No HTTP client implementation provided. \
//!              Desktop: enable the desktop-shims feature. \
//!              Mobile: inject the platform-native adapter."
//!         .to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that one adapter instance can be
//! shared by the controller actor, stream pumps and cache writers.

pub mod database;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
