//! Transport state and the observer snapshot.

use crate::queue::{QueueItem, QueueSlotId};
use core_library::TrackId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Playback transport state.
///
/// ```text
/// Idle ──> Buffering ──> Playing ⇄ Paused
///              │            │
///              └────────────┴──> Ended | Error ──(replace)──> Buffering
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    Ended,
    Error,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Buffering => "buffering",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Ended => "ended",
            TransportState::Error => "error",
        }
    }

    /// A stream exists for the current item.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransportState::Buffering | TransportState::Playing | TransportState::Paused
        )
    }

    /// Only an explicit queue operation leaves these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportState::Ended | TransportState::Error)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of the controller, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub transport: TransportState,
    pub current_slot: Option<QueueSlotId>,
    pub current_track: Option<TrackId>,
    pub current_index: Option<usize>,
    pub position: Duration,
    pub queue: Arc<[QueueItem]>,
    pub radio_active: bool,
    /// Message of the failure that moved the transport to `Error`.
    pub last_error: Option<String>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            transport: TransportState::Idle,
            current_slot: None,
            current_track: None,
            current_index: None,
            position: Duration::ZERO,
            queue: Arc::from(Vec::new()),
            radio_active: false,
            last_error: None,
        }
    }
}

impl PlaybackSnapshot {
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.current_index.and_then(|index| self.queue.get(index))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Track ids in queue order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.queue
            .iter()
            .map(|item| item.track().id().clone())
            .collect()
    }
}
