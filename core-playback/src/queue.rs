//! # Play Queue
//!
//! Ordered list of tracks with a cursor on the current item.
//!
//! Every insertion gets a fresh [`QueueSlotId`], so the same track can sit in
//! the queue several times and each occurrence stays distinguishable. The
//! cursor is `None` only while there is no current item; otherwise it is a
//! valid index.
//!
//! The queue itself is a plain owned value with no interior locking. The
//! controller actor owns it and publishes immutable snapshots.

use crate::error::{PlaybackError, Result};
use core_library::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Per-insertion identifier, distinct from the track id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueSlotId(u64);

impl QueueSlotId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// A track placed in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    slot_id: QueueSlotId,
    track: Track,
}

impl QueueItem {
    pub fn slot_id(&self) -> QueueSlotId {
        self.slot_id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    items: Vec<QueueItem>,
    cursor: Option<usize>,
    next_slot: u64,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn position_of(&self, slot_id: QueueSlotId) -> Option<usize> {
        self.items.iter().position(|item| item.slot_id == slot_id)
    }

    /// Items after the cursor. Without a cursor every item counts.
    pub fn remaining_after_cursor(&self) -> usize {
        match self.cursor {
            Some(index) => self.items.len() - index - 1,
            None => self.items.len(),
        }
    }

    /// Immutable copy for observers.
    pub fn snapshot(&self) -> Arc<[QueueItem]> {
        Arc::from(self.items.as_slice())
    }

    fn wrap(&mut self, tracks: Vec<Track>) -> Vec<QueueItem> {
        tracks
            .into_iter()
            .map(|track| {
                self.next_slot += 1;
                QueueItem {
                    slot_id: QueueSlotId(self.next_slot),
                    track,
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Install `tracks` and put the cursor on `start_index`, clamped into
    /// range. Returns the new cursor.
    pub fn replace(&mut self, tracks: Vec<Track>, start_index: usize) -> Option<usize> {
        self.items = self.wrap(tracks);
        self.cursor = if self.items.is_empty() {
            None
        } else {
            Some(start_index.min(self.items.len() - 1))
        };
        self.cursor
    }

    /// Add to the end. The cursor does not move.
    pub fn append(&mut self, tracks: Vec<Track>) -> usize {
        let items = self.wrap(tracks);
        let count = items.len();
        self.items.extend(items);
        count
    }

    /// Insert right after the current item ("play next"). Without a current
    /// item the tracks go to the front.
    pub fn insert_after_current(&mut self, tracks: Vec<Track>) -> usize {
        let at = self.cursor.map(|index| index + 1).unwrap_or(0);
        let items = self.wrap(tracks);
        let count = items.len();
        self.items.splice(at..at, items);
        count
    }

    /// Shuffle with the thread-local RNG.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Randomly permute all items. The current item stays current: the
    /// cursor follows its slot to wherever it lands.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.current().map(|item| item.slot_id);
        self.items.shuffle(rng);
        if let Some(slot_id) = current {
            self.cursor = self.position_of(slot_id);
        }
    }

    /// Move to the next item.
    ///
    /// # Errors
    ///
    /// `EmptyQueue` when there are no items, `EndOfQueue` when the cursor is
    /// already on the last one. The cursor is unchanged on error.
    pub fn advance(&mut self) -> Result<&QueueItem> {
        if self.items.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        let next = match self.cursor {
            Some(index) if index + 1 >= self.items.len() => {
                return Err(PlaybackError::EndOfQueue)
            }
            Some(index) => index + 1,
            None => 0,
        };
        self.cursor = Some(next);
        Ok(&self.items[next])
    }

    /// Move to the previous item; `StartOfQueue` at index 0.
    pub fn retreat(&mut self) -> Result<&QueueItem> {
        match self.cursor {
            Some(index) if index > 0 => {
                self.cursor = Some(index - 1);
                Ok(&self.items[index - 1])
            }
            Some(_) => Err(PlaybackError::StartOfQueue),
            None if self.items.is_empty() => Err(PlaybackError::EmptyQueue),
            None => Err(PlaybackError::StartOfQueue),
        }
    }

    pub fn jump_to(&mut self, index: usize) -> Result<&QueueItem> {
        if index >= self.items.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.cursor = Some(index);
        Ok(&self.items[index])
    }

    /// Remove one item and re-anchor the cursor.
    ///
    /// Removing the current item moves the cursor to whatever now sits at
    /// the same index, or to the new last item if the removed one was last,
    /// or to `None` if the queue became empty. Removing an earlier item
    /// shifts the cursor down so it stays on the same item.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueItem> {
        if index >= self.items.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        let removed = self.items.remove(index);
        let len = self.items.len();
        self.cursor = match self.cursor {
            Some(cursor) if index < cursor => Some(cursor - 1),
            Some(cursor) if index == cursor => {
                if len == 0 {
                    None
                } else {
                    Some(cursor.min(len - 1))
                }
            }
            other => other,
        };
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter()
            .map(|id| Track::new(*id, Duration::from_secs(180)))
            .collect()
    }

    fn ids(queue: &PlaybackQueue) -> Vec<String> {
        queue
            .items()
            .iter()
            .map(|item| item.track().id().to_string())
            .collect()
    }

    #[test]
    fn test_replace_clamps_start_index() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(queue.replace(tracks(&["a", "b", "c"]), 7), Some(2));
        assert_eq!(queue.replace(tracks(&[]), 0), None);
        assert_eq!(queue.replace(tracks(&["a"]), 0), Some(0));
    }

    #[test]
    fn test_duplicate_tracks_get_distinct_slots() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a", "a"]), 0);
        assert_ne!(queue.items()[0].slot_id(), queue.items()[1].slot_id());
    }

    #[test]
    fn test_append_keeps_cursor() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a", "b"]), 0);
        assert_eq!(queue.append(tracks(&["c"])), 1);
        assert_eq!(ids(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.cursor(), Some(0));

        let mut empty = PlaybackQueue::new();
        empty.append(tracks(&["x"]));
        assert_eq!(empty.cursor(), None);
    }

    #[test]
    fn test_insert_after_current() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a", "b", "c"]), 1);
        queue.insert_after_current(tracks(&["x", "y"]));
        assert_eq!(ids(&queue), vec!["a", "b", "x", "y", "c"]);
        assert_eq!(queue.cursor(), Some(1));
    }

    #[test]
    fn test_advance_and_retreat_boundaries() {
        let mut queue = PlaybackQueue::new();
        assert!(matches!(queue.advance(), Err(PlaybackError::EmptyQueue)));

        queue.replace(tracks(&["a", "b"]), 0);
        assert!(matches!(queue.retreat(), Err(PlaybackError::StartOfQueue)));
        assert_eq!(queue.advance().unwrap().track().id().as_str(), "b");
        assert!(matches!(queue.advance(), Err(PlaybackError::EndOfQueue)));
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.retreat().unwrap().track().id().as_str(), "a");
    }

    #[test]
    fn test_jump_to_out_of_range() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a", "b"]), 0);
        assert!(matches!(
            queue.jump_to(2),
            Err(PlaybackError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn test_remove_before_cursor_shifts_it() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a", "b", "c"]), 2);
        queue.remove_at(0).unwrap();
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().track().id().as_str(), "c");
    }

    #[test]
    fn test_remaining_after_cursor() {
        let mut queue = PlaybackQueue::new();
        queue.append(tracks(&["a", "b", "c"]));
        assert_eq!(queue.remaining_after_cursor(), 3);
        queue.jump_to(1).unwrap();
        assert_eq!(queue.remaining_after_cursor(), 1);
    }

    #[test]
    fn test_clear() {
        let mut queue = PlaybackQueue::new();
        queue.replace(tracks(&["a"]), 0);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }
}
