//! Write-behind persistence for the content cache.
//!
//! Cache mutations are mirrored into a [`CacheSegmentRepository`] by a
//! background task fed through a bounded queue. Enqueueing never blocks:
//! when the queue is full the operation is dropped with a warning, which
//! costs at most a re-fetch after the next restart.

use bytes::Bytes;
use core_async::sync::mpsc;
use core_async::task::JoinHandle;
use core_library::repositories::CacheSegmentRepository;
use core_library::TrackId;
use std::sync::Arc;
use tracing::{debug, warn};

/// A cache mutation to mirror into the durable store.
#[derive(Debug, Clone)]
pub(crate) enum PersistOp {
    Upsert {
        track_id: TrackId,
        offset: u64,
        data: Bytes,
        last_access_ms: i64,
    },
    Touch {
        track_id: TrackId,
        last_access_ms: i64,
    },
    ContentLength {
        track_id: TrackId,
        content_length: u64,
    },
    Delete {
        track_id: TrackId,
    },
}

impl PersistOp {
    fn kind(&self) -> &'static str {
        match self {
            PersistOp::Upsert { .. } => "upsert",
            PersistOp::Touch { .. } => "touch",
            PersistOp::ContentLength { .. } => "content_length",
            PersistOp::Delete { .. } => "delete",
        }
    }
}

/// Sending half of the write-behind queue.
#[derive(Clone)]
pub(crate) struct PersistenceQueue {
    tx: mpsc::Sender<PersistOp>,
}

impl PersistenceQueue {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(
        repository: Arc<dyn CacheSegmentRepository>,
        depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let handle = core_async::spawn(run_writer(repository, rx));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, op: PersistOp) {
        let kind = op.kind();
        if let Err(e) = self.tx.try_send(op) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(op = kind, "Cache persistence queue full; dropping operation")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(op = kind, "Cache persistence writer stopped; dropping operation")
                }
            }
        }
    }
}

async fn run_writer(
    repository: Arc<dyn CacheSegmentRepository>,
    mut rx: mpsc::Receiver<PersistOp>,
) {
    debug!("Cache persistence writer started");
    while let Some(op) = rx.recv().await {
        let kind = op.kind();
        let result = match op {
            PersistOp::Upsert {
                track_id,
                offset,
                data,
                last_access_ms,
            } => {
                repository
                    .upsert_segment(&track_id, offset, &data, last_access_ms)
                    .await
            }
            PersistOp::Touch {
                track_id,
                last_access_ms,
            } => repository.touch(&track_id, last_access_ms).await,
            PersistOp::ContentLength {
                track_id,
                content_length,
            } => repository.set_content_length(&track_id, content_length).await,
            PersistOp::Delete { track_id } => repository.delete_track(&track_id).await,
        };

        if let Err(e) = result {
            warn!(op = kind, error = %e, "Cache persistence failed");
        }
    }
    debug!("Cache persistence writer stopped");
}
