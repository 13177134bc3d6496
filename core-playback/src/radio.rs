//! # Radio Continuation
//!
//! Keeps the queue growing from an algorithmic source once it nears its end.
//!
//! ## State machine
//!
//! ```text
//!            start(seed)               stop() / exhausted
//! Inactive ───────────────> Active ───────────────────────> Inactive
//!                            │  ▲
//!                            └──┘ start(other seed): new session
//! ```
//!
//! Each `start` opens a new session. Fetches are split into
//! [`plan`](RadioContinuation::plan), which runs synchronously on the owner,
//! and [`apply`](RadioContinuation::apply), which receives the result later.
//! Results tagged with an old session are ignored, so a batch requested
//! before a `stop` or a restart can never land in the new queue.

use crate::error::{PlaybackError, Result};
use crate::traits::{ContinuationCursor, RadioBatch, RadioSource};
use core_library::{Track, TrackId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifies one `start`..`stop` span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RadioSessionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioState {
    Inactive,
    Active {
        seed: TrackId,
        cursor: ContinuationCursor,
        session: RadioSessionId,
    },
}

/// A fetch the owner should run off-thread.
#[derive(Debug, Clone)]
pub struct RadioRequest {
    pub session: RadioSessionId,
    pub seed: TrackId,
    pub cursor: ContinuationCursor,
    pub limit: usize,
}

impl RadioRequest {
    pub async fn execute(&self, source: &dyn RadioSource) -> Result<RadioBatch> {
        source
            .fetch_batch(&self.seed, &self.cursor, self.limit)
            .await
            .map_err(|e| match e {
                PlaybackError::RadioFetchFailed(_) => e,
                other => PlaybackError::RadioFetchFailed(other.to_string()),
            })
    }
}

/// What applying a fetch result did.
#[derive(Debug)]
pub enum RadioOutcome {
    /// The session ended or changed while the fetch was in flight.
    Stale,
    /// Tracks to append. `exhausted` means the session deactivated itself.
    Batch { tracks: Vec<Track>, exhausted: bool },
    /// The fetch failed; state is unchanged and a later check may retry.
    Failed(PlaybackError),
}

pub struct RadioContinuation {
    source: Arc<dyn RadioSource>,
    state: RadioState,
    next_session: u64,
    in_flight: Option<RadioSessionId>,
    batch_limit: usize,
}

impl RadioContinuation {
    pub fn new(source: Arc<dyn RadioSource>, batch_limit: usize) -> Self {
        Self {
            source,
            state: RadioState::Inactive,
            next_session: 0,
            in_flight: None,
            batch_limit: batch_limit.max(1),
        }
    }

    pub fn source(&self) -> Arc<dyn RadioSource> {
        self.source.clone()
    }

    pub fn state(&self) -> &RadioState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RadioState::Active { .. })
    }

    pub fn seed(&self) -> Option<&TrackId> {
        match &self.state {
            RadioState::Active { seed, .. } => Some(seed),
            RadioState::Inactive => None,
        }
    }

    pub fn session(&self) -> Option<RadioSessionId> {
        match &self.state {
            RadioState::Active { session, .. } => Some(*session),
            RadioState::Inactive => None,
        }
    }

    /// Whether a fetch for the current session is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some() && self.in_flight == self.session()
    }

    /// Begin a new session seeded by `seed`, replacing any active one.
    pub fn start(&mut self, seed: TrackId) -> RadioSessionId {
        if let Some(previous) = self.seed() {
            debug!(previous = %previous, "Replacing active radio session");
        }
        self.next_session += 1;
        let session = RadioSessionId(self.next_session);
        info!(seed = %seed, "Radio started");
        self.state = RadioState::Active {
            seed,
            cursor: ContinuationCursor::Initial,
            session,
        };
        self.in_flight = None;
        session
    }

    /// Deactivate. Returns whether a session was active; calling it again is
    /// a no-op.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        if was_active {
            info!("Radio stopped");
        }
        self.state = RadioState::Inactive;
        self.in_flight = None;
        was_active
    }

    /// Decide whether to fetch more, given how many items remain after the
    /// cursor. Marks the returned request as in flight; at most one fetch is
    /// outstanding per session.
    pub fn plan(&mut self, remaining: usize, low_water_mark: usize) -> Option<RadioRequest> {
        if remaining > low_water_mark || self.is_fetching() {
            return None;
        }
        let RadioState::Active {
            seed,
            cursor,
            session,
        } = &self.state
        else {
            return None;
        };
        let request = RadioRequest {
            session: *session,
            seed: seed.clone(),
            cursor: cursor.clone(),
            limit: self.batch_limit,
        };
        self.in_flight = Some(*session);
        debug!(seed = %seed, remaining, "Radio continuation requested");
        Some(request)
    }

    /// Fold a fetch result back in.
    pub fn apply(&mut self, session: RadioSessionId, result: Result<RadioBatch>) -> RadioOutcome {
        if self.session() != Some(session) {
            debug!("Discarding radio result from a finished session");
            return RadioOutcome::Stale;
        }
        self.in_flight = None;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Radio fetch failed");
                return RadioOutcome::Failed(e);
            }
        };

        let exhausted = batch.tracks.is_empty() || batch.next.is_none();
        if let (RadioState::Active { cursor, .. }, Some(next)) = (&mut self.state, batch.next) {
            *cursor = ContinuationCursor::Token(next);
        }
        if exhausted {
            info!(appended = batch.tracks.len(), "Radio source exhausted");
            self.state = RadioState::Inactive;
        }
        RadioOutcome::Batch {
            tracks: batch.tracks,
            exhausted,
        }
    }

    /// Plan, fetch and apply in one call.
    ///
    /// Returns `None` when inactive, above the low-water mark, or when the
    /// source had nothing more. A failed fetch leaves the state unchanged
    /// and returns `RadioFetchFailed`.
    pub async fn maybe_continue(
        &mut self,
        remaining: usize,
        low_water_mark: usize,
    ) -> Result<Option<Vec<Track>>> {
        let Some(request) = self.plan(remaining, low_water_mark) else {
            return Ok(None);
        };
        let result = request.execute(self.source.as_ref()).await;
        match self.apply(request.session, result) {
            RadioOutcome::Batch { tracks, .. } if !tracks.is_empty() => Ok(Some(tracks)),
            RadioOutcome::Batch { .. } | RadioOutcome::Stale => Ok(None),
            RadioOutcome::Failed(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for RadioContinuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioContinuation")
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .field("batch_limit", &self.batch_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoRadio;

    #[async_trait]
    impl RadioSource for NoRadio {
        async fn fetch_batch(
            &self,
            _seed: &TrackId,
            _cursor: &ContinuationCursor,
            _limit: usize,
        ) -> Result<RadioBatch> {
            Ok(RadioBatch::exhausted())
        }
    }

    fn radio() -> RadioContinuation {
        RadioContinuation::new(Arc::new(NoRadio), 5)
    }

    fn batch(ids: &[&str], next: Option<&str>) -> RadioBatch {
        RadioBatch::new(
            ids.iter()
                .map(|id| Track::new(*id, Duration::from_secs(60)))
                .collect(),
            next.map(str::to_string),
        )
    }

    #[test]
    fn test_plan_respects_low_water_mark() {
        let mut radio = radio();
        assert!(radio.plan(0, 1).is_none());

        radio.start(TrackId::from("seed"));
        assert!(radio.plan(2, 1).is_none());
        let request = radio.plan(1, 1).unwrap();
        assert_eq!(request.cursor, ContinuationCursor::Initial);
        assert_eq!(request.limit, 5);
        // One fetch at a time.
        assert!(radio.plan(0, 1).is_none());
    }

    #[test]
    fn test_apply_advances_cursor() {
        let mut radio = radio();
        radio.start(TrackId::from("seed"));
        let request = radio.plan(0, 1).unwrap();

        let outcome = radio.apply(request.session, Ok(batch(&["a", "b"], Some("page-2"))));
        assert!(matches!(outcome, RadioOutcome::Batch { ref tracks, exhausted: false } if tracks.len() == 2));
        assert_eq!(radio.plan(0, 1).unwrap().cursor, ContinuationCursor::Token("page-2".into()));
    }

    #[test]
    fn test_failure_leaves_state_unchanged() {
        let mut radio = radio();
        radio.start(TrackId::from("seed"));
        let before = radio.state().clone();
        let request = radio.plan(0, 1).unwrap();

        let outcome = radio.apply(
            request.session,
            Err(PlaybackError::RadioFetchFailed("offline".into())),
        );
        assert!(matches!(outcome, RadioOutcome::Failed(_)));
        assert_eq!(radio.state(), &before);
        assert!(radio.plan(0, 1).is_some());
    }

    #[test]
    fn test_exhaustion_deactivates() {
        let mut radio = radio();
        radio.start(TrackId::from("seed"));
        let request = radio.plan(0, 1).unwrap();

        let outcome = radio.apply(request.session, Ok(batch(&["last"], None)));
        assert!(matches!(outcome, RadioOutcome::Batch { exhausted: true, .. }));
        assert!(!radio.is_active());
    }

    #[test]
    fn test_stale_session_ignored() {
        let mut radio = radio();
        radio.start(TrackId::from("one"));
        let old = radio.plan(0, 1).unwrap();
        radio.start(TrackId::from("two"));

        let outcome = radio.apply(old.session, Ok(batch(&["x"], Some("n"))));
        assert!(matches!(outcome, RadioOutcome::Stale));
        assert_eq!(radio.seed(), Some(&TrackId::from("two")));
        assert_eq!(radio.plan(0, 1).unwrap().cursor, ContinuationCursor::Initial);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut radio = radio();
        assert!(!radio.stop());
        radio.start(TrackId::from("seed"));
        assert!(radio.stop());
        assert!(!radio.stop());
        assert_eq!(radio.state(), &RadioState::Inactive);
    }
}
