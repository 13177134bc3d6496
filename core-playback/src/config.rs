//! # Playback Configuration
//!
//! Configuration types for the playback controller and track streaming.

use serde::{Deserialize, Serialize};

/// Playback controller configuration.
///
/// Controls how audio bytes are requested and when radio continuation kicks in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Bytes requested per chunk from the cache or the network.
    ///
    /// Default: 64 KB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Remaining items after the cursor at or below which radio is asked
    /// for more tracks.
    ///
    /// Default: 1.
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    /// Maximum tracks requested per radio batch.
    ///
    /// Default: 10.
    #[serde(default = "default_radio_batch_limit")]
    pub radio_batch_limit: usize,

    /// Whether radio continuation may be started at all.
    ///
    /// Default: true.
    #[serde(default = "default_enable_radio")]
    pub enable_radio: bool,

    /// Whether bytes fetched from the network are written back into the
    /// content cache.
    ///
    /// Default: true.
    #[serde(default = "default_cache_write_back")]
    pub cache_write_back: bool,

    /// Capacity of the controller's command mailbox.
    ///
    /// Default: 64.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            low_water_mark: default_low_water_mark(),
            radio_batch_limit: default_radio_batch_limit(),
            enable_radio: default_enable_radio(),
            cache_write_back: default_cache_write_back(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl PlaybackConfig {
    /// Create a configuration optimized for fast start on slow networks.
    ///
    /// - Smaller chunks so the first bytes arrive sooner
    /// - Radio asked for more one item earlier
    pub fn low_latency() -> Self {
        Self {
            chunk_size: 16 * 1024,
            low_water_mark: 2,
            ..Default::default()
        }
    }

    /// Create a configuration that favors building up offline copies.
    ///
    /// - Larger chunks to reduce request overhead
    /// - Larger radio batches so fewer fetches are needed
    pub fn offline_first() -> Self {
        Self {
            chunk_size: 256 * 1024,
            radio_batch_limit: 25,
            cache_write_back: true,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.radio_batch_limit == 0 {
            return Err("radio_batch_limit must be > 0".to_string());
        }

        if self.command_buffer == 0 {
            return Err("command_buffer must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_low_water_mark() -> usize {
    1
}

fn default_radio_batch_limit() -> usize {
    10
}

fn default_enable_radio() -> bool {
    true
}

fn default_cache_write_back() -> bool {
    true
}

fn default_command_buffer() -> usize {
    64
}
