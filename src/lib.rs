//! Umbrella crate for the music playback service.
//!
//! Hosts depend on this one crate and pick a platform feature; with
//! `desktop-shims` the service is re-exported together with the reqwest-backed
//! HTTP client wiring.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
