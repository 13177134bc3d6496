//! Database Abstraction Layer
//!
//! The content cache persists resident byte ranges so that offline
//! availability survives restarts. This trait is the only way the core
//! reaches that store; the native implementation lives in
//! `core-library::adapters::SqliteAdapter`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseAdapter, DatabaseConfig};
//!
//! let mut adapter = SqliteAdapter::new(DatabaseConfig::new("cache.db")).await?;
//! adapter.initialize().await?;
//! let rows = adapter.query("SELECT track_id FROM cache_entries", &[]).await?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration for cross-platform initialization
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path or connection string
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,

    /// Enable statement caching
    pub enable_cache: bool,

    /// Statement cache capacity
    pub cache_capacity: usize,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }

    /// Create a configuration for an in-memory database
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Query Result Types
// =============================================================================

/// Represents a single row from a database query as a map of column names to values
pub type QueryRow = std::collections::HashMap<String, QueryValue>;

/// Represents a database value that can be null, integer, real, text, or blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl QueryValue {
    /// Convert to i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Real(r) => Some(*r),
            QueryValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to String if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to String (owned) if possible
    pub fn as_string(&self) -> Option<String> {
        match self {
            QueryValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Convert to bytes if possible
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            QueryValue::Blob(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

// =============================================================================
// Database Adapter Trait
// =============================================================================

/// Database adapter trait for the durable store behind the content cache.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: the cache write-behind task and
/// start-up restore share one adapter.
///
/// ## Error Handling
///
/// All methods return `Result<T>` using the `BridgeError` type.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Initialize the database connection and run migrations
    ///
    /// This method should:
    /// 1. Establish database connection(s)
    /// 2. Configure the database (WAL mode, foreign keys, etc.)
    /// 3. Run pending migrations
    /// 4. Perform a health check
    async fn initialize(&mut self) -> Result<()>;

    /// Check if the database connection is healthy
    async fn health_check(&self) -> Result<()>;

    /// Close all database connections
    async fn close(&mut self) -> Result<()>;

    // =========================================================================
    // Raw Query Execution
    // =========================================================================

    /// Execute a raw SQL query and return rows
    ///
    /// # Arguments
    ///
    /// * `query` - SQL query string
    /// * `params` - Query parameters (positional)
    ///
    /// # Safety
    ///
    /// This method should use parameterized queries to prevent SQL injection.
    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Execute a SQL statement that doesn't return rows (INSERT, UPDATE, DELETE)
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64>;

    /// Execute a query and return a single optional row
    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Execute multiple statements atomically
    ///
    /// Either every statement is applied or none is. Returns one row count per
    /// statement.
    async fn execute_batch(&self, statements: &[(&str, &[QueryValue])]) -> Result<Vec<u64>>;
}

// =============================================================================
// Helper Macros for Implementations
// =============================================================================

/// Helper macro to extract values from QueryRow
#[macro_export]
macro_rules! get_column {
    ($row:expr, $col:expr, i64) => {
        $row.get($col).and_then(|v| v.as_i64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid i64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, f64) => {
        $row.get($col).and_then(|v| v.as_f64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid f64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, String) => {
        $row.get($col).and_then(|v| v.as_string()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!(
                "Missing or invalid String column: {}",
                $col
            ))
        })?
    };
    ($row:expr, $col:expr, Vec<u8>) => {
        $row.get($col)
            .and_then(|v| v.as_bytes())
            .map(|b| b.to_vec())
            .ok_or_else(|| {
                $crate::BridgeError::DatabaseError(format!(
                    "Missing or invalid blob column: {}",
                    $col
                ))
            })?
    };
    ($row:expr, $col:expr, Option<String>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_string() })
    };
    ($row:expr, $col:expr, Option<i64>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_i64() })
    };
}
