//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback service:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback and service
//! crates depend on. It establishes the logging conventions, the fail-fast
//! configuration builder and the broadcast channel that carries playback,
//! queue, radio and cache events to observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
