//! Durable store for the audio content cache.
//!
//! Stores resident byte segments and per-track bookkeeping through the
//! `DatabaseAdapter` bridge so the same repository works over the desktop
//! sqlx adapter and host-provided mobile adapters.

use crate::error::{LibraryError, Result};
use crate::models::TrackId;
use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use bridge_traits::get_column;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// One persisted byte segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSegment {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// A cached track as it was last persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub track_id: TrackId,
    pub content_length: Option<u64>,
    pub last_access_ms: i64,
    /// Segments ordered by offset. They may overlap; the cache coalesces
    /// them on restore.
    pub segments: Vec<StoredSegment>,
}

impl StoredEntry {
    pub fn resident_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.data.len() as u64).sum()
    }
}

/// Repository trait for cache segment persistence.
#[async_trait]
pub trait CacheSegmentRepository: Send + Sync {
    /// Create the tables if the adapter did not run migrations.
    async fn initialize(&self) -> Result<()>;

    /// Store `data` at `offset`, replacing a segment previously stored at
    /// the same offset, and stamp the entry's last access.
    async fn upsert_segment(
        &self,
        track_id: &TrackId,
        offset: u64,
        data: &[u8],
        last_access_ms: i64,
    ) -> Result<()>;

    /// Remove a track and all of its segments.
    async fn delete_track(&self, track_id: &TrackId) -> Result<()>;

    /// Update the last-access stamp of a track.
    async fn touch(&self, track_id: &TrackId, last_access_ms: i64) -> Result<()>;

    /// Record the declared content length of a track.
    async fn set_content_length(&self, track_id: &TrackId, content_length: u64) -> Result<()>;

    /// Load every stored entry, most recently accessed first.
    async fn load_all(&self) -> Result<Vec<StoredEntry>>;

    /// Sum of stored segment sizes.
    async fn total_bytes(&self) -> Result<u64>;
}

/// SQL implementation of CacheSegmentRepository.
pub struct SqliteCacheSegmentRepository {
    db: Arc<dyn DatabaseAdapter>,
}

const ENSURE_ENTRY_SQL: &str = "INSERT INTO cache_entries (track_id, content_length, last_access_ms) \
     VALUES (?, NULL, ?) \
     ON CONFLICT(track_id) DO UPDATE SET last_access_ms = excluded.last_access_ms";

impl SqliteCacheSegmentRepository {
    pub fn new(db: Arc<dyn DatabaseAdapter>) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &QueryRow) -> Result<StoredEntry> {
        let track_id = get_column!(row, "track_id", String);
        let content_length = get_column!(row, "content_length", Option<i64>);
        let last_access_ms = get_column!(row, "last_access_ms", i64);

        Ok(StoredEntry {
            track_id: TrackId::new(track_id),
            content_length: content_length.map(|len| len.max(0) as u64),
            last_access_ms,
            segments: Vec::new(),
        })
    }

    fn row_to_segment(row: &QueryRow) -> Result<(String, StoredSegment)> {
        let track_id = get_column!(row, "track_id", String);
        let offset = get_column!(row, "byte_offset", i64);
        let data = get_column!(row, "data", Vec<u8>);

        if offset < 0 {
            return Err(LibraryError::CacheStore(format!(
                "Negative segment offset {} for track {}",
                offset, track_id
            )));
        }

        Ok((
            track_id,
            StoredSegment {
                offset: offset as u64,
                data,
            },
        ))
    }
}

fn to_sql_int(value: u64, field: &str) -> Result<QueryValue> {
    i64::try_from(value)
        .map(QueryValue::Integer)
        .map_err(|_| LibraryError::InvalidInput {
            field: field.to_string(),
            message: format!("{} does not fit in a SQL integer", value),
        })
}

#[async_trait]
impl CacheSegmentRepository for SqliteCacheSegmentRepository {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        let statements = [
            (
                "CREATE TABLE IF NOT EXISTS cache_entries (
                    track_id TEXT PRIMARY KEY NOT NULL,
                    content_length INTEGER,
                    last_access_ms INTEGER NOT NULL
                )",
                &[] as &[QueryValue],
            ),
            (
                "CREATE TABLE IF NOT EXISTS cache_segments (
                    track_id TEXT NOT NULL,
                    byte_offset INTEGER NOT NULL,
                    data BLOB NOT NULL,
                    PRIMARY KEY (track_id, byte_offset),
                    FOREIGN KEY (track_id) REFERENCES cache_entries(track_id) ON DELETE CASCADE
                )",
                &[],
            ),
            (
                "CREATE INDEX IF NOT EXISTS idx_cache_entries_last_access ON cache_entries(last_access_ms)",
                &[],
            ),
        ];

        self.db.execute_batch(&statements).await.map_err(|e| {
            error!("Failed to create cache store tables: {}", e);
            LibraryError::from(e)
        })?;

        debug!("Cache segment repository initialized");
        Ok(())
    }

    #[instrument(skip(self, data), fields(track_id = %track_id, len = data.len()))]
    async fn upsert_segment(
        &self,
        track_id: &TrackId,
        offset: u64,
        data: &[u8],
        last_access_ms: i64,
    ) -> Result<()> {
        let entry_params = [
            QueryValue::Text(track_id.to_string()),
            QueryValue::Integer(last_access_ms),
        ];
        let segment_params = [
            QueryValue::Text(track_id.to_string()),
            to_sql_int(offset, "offset")?,
            QueryValue::Blob(data.to_vec()),
        ];

        self.db
            .execute_batch(&[
                (ENSURE_ENTRY_SQL, &entry_params[..]),
                (
                    "INSERT INTO cache_segments (track_id, byte_offset, data) VALUES (?, ?, ?) \
                     ON CONFLICT(track_id, byte_offset) DO UPDATE SET data = excluded.data",
                    &segment_params[..],
                ),
            ])
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(track_id = %track_id))]
    async fn delete_track(&self, track_id: &TrackId) -> Result<()> {
        let params = [QueryValue::Text(track_id.to_string())];

        self.db
            .execute_batch(&[
                ("DELETE FROM cache_segments WHERE track_id = ?", &params[..]),
                ("DELETE FROM cache_entries WHERE track_id = ?", &params[..]),
            ])
            .await?;

        Ok(())
    }

    async fn touch(&self, track_id: &TrackId, last_access_ms: i64) -> Result<()> {
        let params = [
            QueryValue::Integer(last_access_ms),
            QueryValue::Text(track_id.to_string()),
        ];

        self.db
            .execute(
                "UPDATE cache_entries SET last_access_ms = ? WHERE track_id = ?",
                &params,
            )
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(track_id = %track_id))]
    async fn set_content_length(&self, track_id: &TrackId, content_length: u64) -> Result<()> {
        let params = [
            QueryValue::Text(track_id.to_string()),
            to_sql_int(content_length, "content_length")?,
        ];

        // Entries only exist once a segment was stored; a length for a
        // track with no bytes creates a row with a zero access stamp.
        self.db
            .execute(
                "INSERT INTO cache_entries (track_id, content_length, last_access_ms) VALUES (?, ?, 0) \
                 ON CONFLICT(track_id) DO UPDATE SET content_length = excluded.content_length",
                &params,
            )
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> Result<Vec<StoredEntry>> {
        let entry_rows = self
            .db
            .query(
                "SELECT track_id, content_length, last_access_ms FROM cache_entries \
                 ORDER BY last_access_ms DESC, track_id ASC",
                &[],
            )
            .await?;

        let mut entries = entry_rows
            .iter()
            .map(Self::row_to_entry)
            .collect::<Result<Vec<_>>>()?;

        let segment_rows = self
            .db
            .query(
                "SELECT track_id, byte_offset, data FROM cache_segments ORDER BY track_id, byte_offset",
                &[],
            )
            .await?;

        let mut by_track: std::collections::HashMap<String, Vec<StoredSegment>> =
            std::collections::HashMap::new();
        for row in &segment_rows {
            let (track_id, segment) = Self::row_to_segment(row)?;
            by_track.entry(track_id).or_default().push(segment);
        }

        for entry in &mut entries {
            if let Some(segments) = by_track.remove(entry.track_id.as_str()) {
                entry.segments = segments;
            }
        }

        debug!(entries = entries.len(), "Loaded cache store");
        Ok(entries)
    }

    async fn total_bytes(&self) -> Result<u64> {
        let row = self
            .db
            .query_one_optional(
                "SELECT COALESCE(SUM(LENGTH(data)), 0) AS total FROM cache_segments",
                &[],
            )
            .await?;

        match row {
            Some(row) => {
                let total = get_column!(row, "total", i64);
                Ok(total.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}
