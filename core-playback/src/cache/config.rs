//! Cache configuration and policies

use serde::{Deserialize, Serialize};

/// Configuration for the content cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum resident bytes across all tracks (default: 256MB)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Eviction policy when a write would exceed `max_bytes`
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Mirror writes and evictions into the durable store (default: false)
    #[serde(default)]
    pub persist: bool,

    /// Pending durable-store operations before new ones are dropped
    /// (default: 256)
    #[serde(default = "default_persistence_queue_depth")]
    pub persistence_queue_depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            eviction_policy: EvictionPolicy::default(),
            persist: false,
            persistence_queue_depth: default_persistence_queue_depth(),
        }
    }
}

fn default_max_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_persistence_queue_depth() -> usize {
    256
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Set eviction policy.
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Enable or disable durable persistence.
    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist = enabled;
        self
    }

    /// Set the write-behind queue depth.
    pub fn with_persistence_queue_depth(mut self, depth: usize) -> Self {
        self.persistence_queue_depth = depth;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("max_bytes must be greater than 0".to_string());
        }

        if self.persist && self.persistence_queue_depth == 0 {
            return Err("persistence_queue_depth must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Policy for choosing victims when the cache is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Remove whole entries, least recently accessed first
    #[default]
    Lru,
}

impl EvictionPolicy {
    /// Returns a human-readable description of the policy.
    pub fn description(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "Remove whole tracks that were read or written least recently",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(!config.persist);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new()
            .with_max_bytes(1000)
            .with_persistence(true)
            .with_persistence_queue_depth(8);

        assert_eq!(config.max_bytes, 1000);
        assert!(config.persist);
        assert_eq!(config.persistence_queue_depth, 8);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());
        assert!(CacheConfig::default().with_max_bytes(0).validate().is_err());
        assert!(CacheConfig::default()
            .with_persistence(true)
            .with_persistence_queue_depth(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_policy_serializes_snake_case() {
        let json = serde_json::to_string(&EvictionPolicy::Lru).unwrap();
        assert_eq!(json, "\"lru\"");
        assert!(!EvictionPolicy::Lru.description().is_empty());
    }
}
