//! End-to-end controller behaviour over an in-memory transport.

use async_trait::async_trait;
use bytes::Bytes;
use core_library::{Track, TrackId};
use core_playback::cache::{CacheConfig, ContentCache};
use core_playback::traits::{
    AudioSink, AudioTransport, ContinuationCursor, FetchedChunk, RadioBatch, RadioSource,
};
use core_playback::{
    PlaybackConfig, PlaybackController, PlaybackError, PlaybackSnapshot, Result, SkipOutcome,
    TrackSource, TransportState,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(5);
const TRACK_BYTES: usize = 16;

// ============================================================================
// Test doubles
// ============================================================================

/// Serves fixed payloads; fetches for a gated track block until released.
#[derive(Default)]
struct MemoryTransport {
    payloads: Mutex<HashMap<TrackId, Bytes>>,
    gates: Mutex<HashMap<TrackId, Arc<Semaphore>>>,
}

impl MemoryTransport {
    fn with_tracks(ids: &[&str]) -> Arc<Self> {
        let transport = Self::default();
        for id in ids {
            let payload: Bytes = (0..TRACK_BYTES as u8).collect();
            transport.payloads.lock().insert(TrackId::from(*id), payload);
        }
        Arc::new(transport)
    }

    fn gate(&self, id: &str) {
        self.gates
            .lock()
            .insert(TrackId::from(id), Arc::new(Semaphore::new(0)));
    }

    fn release(&self, id: &str) {
        if let Some(gate) = self.gates.lock().get(&TrackId::from(id)) {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl AudioTransport for MemoryTransport {
    async fn fetch_range(
        &self,
        track_id: &TrackId,
        offset: u64,
        max_len: u64,
    ) -> Result<FetchedChunk> {
        let gate = self.gates.lock().get(track_id).cloned();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| PlaybackError::Cancelled)?;
        }

        let payload = self
            .payloads
            .lock()
            .get(track_id)
            .cloned()
            .ok_or_else(|| PlaybackError::SourceUnavailable(track_id.to_string()))?;
        let total = payload.len() as u64;
        if offset >= total {
            return Ok(FetchedChunk::end(Some(total)));
        }
        let end = (offset + max_len).min(total);
        Ok(FetchedChunk::new(
            payload.slice(offset as usize..end as usize),
            Some(total),
        ))
    }
}

#[derive(Default)]
struct RecordingSink {
    chunks: Mutex<Vec<(TrackId, u64)>>,
}

impl RecordingSink {
    fn offsets_for(&self, id: &str) -> Vec<u64> {
        self.chunks
            .lock()
            .iter()
            .filter(|(track, _)| track.as_str() == id)
            .map(|(_, offset)| *offset)
            .collect()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn on_chunk(&self, track_id: &TrackId, offset: u64, _chunk: Bytes) -> Result<()> {
        self.chunks.lock().push((track_id.clone(), offset));
        Ok(())
    }
}

/// Hands out scripted batches in order; optionally holds each fetch until
/// released.
struct ScriptedRadio {
    script: Mutex<VecDeque<Result<RadioBatch>>>,
    gate: Option<Semaphore>,
}

impl ScriptedRadio {
    fn new(script: Vec<Result<RadioBatch>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            gate: None,
        }
    }

    fn gated(script: Vec<Result<RadioBatch>>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(script)
        }
    }

    fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl RadioSource for ScriptedRadio {
    async fn fetch_batch(
        &self,
        _seed: &TrackId,
        _cursor: &ContinuationCursor,
        _limit: usize,
    ) -> Result<RadioBatch> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|_| PlaybackError::Cancelled)?;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RadioBatch::exhausted()))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    controller: PlaybackController,
    events: broadcast::Receiver<CoreEvent>,
    sink: Arc<RecordingSink>,
    task: JoinHandle<()>,
}

fn spawn_controller(
    transport: Arc<MemoryTransport>,
    radio: Option<Arc<ScriptedRadio>>,
) -> Harness {
    let config = PlaybackConfig {
        chunk_size: 4,
        ..Default::default()
    };
    let cache = Arc::new(ContentCache::new(CacheConfig::new().with_max_bytes(1 << 20)));
    let source = TrackSource::new(cache, transport, &config);
    let sink = Arc::new(RecordingSink::default());
    let bus = EventBus::new(512);
    let events = bus.subscribe();

    let mut builder = PlaybackController::builder(source)
        .config(config)
        .sink(sink.clone())
        .event_bus(bus);
    if let Some(radio) = radio {
        builder = builder.radio_source(radio);
    }
    let (controller, task) = builder.spawn().unwrap();

    Harness {
        controller,
        events,
        sink,
        task,
    }
}

fn track(id: &str) -> Track {
    Track::new(id, Duration::from_secs(4)).with_content_length(TRACK_BYTES as u64)
}

fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

fn batch(ids: &[&str], next: Option<&str>) -> Result<RadioBatch> {
    Ok(RadioBatch::new(tracks(ids), next.map(str::to_string)))
}

async fn wait_until(
    controller: &PlaybackController,
    predicate: impl Fn(&PlaybackSnapshot) -> bool,
) -> PlaybackSnapshot {
    let mut rx = controller.subscribe();
    let snapshot = tokio::time::timeout(TIMEOUT, rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for controller state")
        .expect("controller stopped");
    let snapshot = (*snapshot).clone();
    snapshot
}

async fn wait_playing(controller: &PlaybackController, id: &str) -> PlaybackSnapshot {
    wait_until(controller, |s| {
        s.transport == TransportState::Playing
            && s.current_track.as_ref().map(TrackId::as_str) == Some(id)
    })
    .await
}

/// Next transport transition on the event bus, skipping everything else.
async fn next_transition(events: &mut broadcast::Receiver<CoreEvent>) -> (String, String) {
    loop {
        let event = tokio::time::timeout(TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for transition")
            .expect("event bus closed");
        if let CoreEvent::Playback(PlaybackEvent::TransportChanged { from, to }) = event {
            return (from, to);
        }
    }
}

fn transition(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
}

fn current_id(snapshot: &PlaybackSnapshot) -> Option<&str> {
    snapshot.current_track.as_ref().map(TrackId::as_str)
}

// ============================================================================
// Queue navigation
// ============================================================================

#[tokio::test]
async fn test_force_play_walks_queue_to_end() {
    let transport = MemoryTransport::with_tracks(&["a", "b", "c"]);
    let mut h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b", "c"]))
        .await
        .unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(current_id(&snapshot), Some("a"));
    assert_eq!(snapshot.current_index, Some(0));

    assert_eq!(next_transition(&mut h.events).await, transition("idle", "buffering"));
    assert_eq!(next_transition(&mut h.events).await, transition("buffering", "playing"));

    assert_eq!(h.controller.skip_next().await.unwrap(), SkipOutcome::Advanced);
    assert_eq!(h.controller.skip_next().await.unwrap(), SkipOutcome::Advanced);
    wait_playing(&h.controller, "c").await;

    let err = h.controller.skip_next().await.unwrap_err();
    assert!(matches!(err, PlaybackError::EndOfQueue));
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.transport, TransportState::Ended);
    assert_eq!(snapshot.queue_len(), 3);
    assert_eq!(snapshot.current_index, Some(2));
}

#[tokio::test]
async fn test_force_play_at_index_clamps() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_at_index(tracks(&["a", "b"]), 9)
        .await
        .unwrap();
    assert_eq!(current_id(&h.controller.snapshot()), Some("b"));
}

#[tokio::test]
async fn test_force_play_empty_list_goes_idle() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.force_play_from_beginning(Vec::new()).await.unwrap();

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.transport, TransportState::Idle);
    assert_eq!(snapshot.current_index, None);
    assert_eq!(snapshot.queue_len(), 0);
}

#[tokio::test]
async fn test_enqueue_does_not_start_playback() {
    let transport = MemoryTransport::with_tracks(&["a", "b", "c"]);
    let h = spawn_controller(transport, None);

    assert_eq!(h.controller.enqueue(tracks(&["a", "b"])).await.unwrap(), 2);
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.transport, TransportState::Idle);
    assert_eq!(snapshot.current_index, None);
    assert_eq!(snapshot.queue_len(), 2);
    assert!(h.sink.chunks.lock().is_empty());

    // Appending while playing leaves the current item alone.
    h.controller.jump_to(0).await.unwrap();
    wait_playing(&h.controller, "a").await;
    h.controller.enqueue(tracks(&["c"])).await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(current_id(&snapshot), Some("a"));
    assert_eq!(snapshot.queue_len(), 3);
}

#[tokio::test]
async fn test_play_next_inserts_after_current() {
    let transport = MemoryTransport::with_tracks(&["a", "b", "x"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b"]))
        .await
        .unwrap();
    h.controller.play_next(tracks(&["x"])).await.unwrap();

    assert_eq!(
        h.controller.snapshot().track_ids(),
        vec![TrackId::from("a"), TrackId::from("x"), TrackId::from("b")]
    );
    h.controller.skip_next().await.unwrap();
    assert_eq!(current_id(&h.controller.snapshot()), Some("x"));
}

#[tokio::test]
async fn test_skip_previous_at_start_leaves_state_untouched() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b"]))
        .await
        .unwrap();
    let before = wait_playing(&h.controller, "a").await;

    assert!(matches!(
        h.controller.skip_previous().await,
        Err(PlaybackError::StartOfQueue)
    ));
    let after = h.controller.snapshot();
    assert_eq!(after.current_slot, before.current_slot);
    assert_eq!(after.transport, TransportState::Playing);
}

#[tokio::test]
async fn test_skip_on_empty_queue() {
    let transport = MemoryTransport::with_tracks(&[]);
    let h = spawn_controller(transport, None);
    assert!(matches!(
        h.controller.skip_next().await,
        Err(PlaybackError::EmptyQueue)
    ));
}

#[tokio::test]
async fn test_shuffle_keeps_current_item() {
    let ids = ["a", "b", "c", "d", "e", "f"];
    let transport = MemoryTransport::with_tracks(&ids);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_at_index(tracks(&ids), 3)
        .await
        .unwrap();
    let before = h.controller.snapshot();
    h.controller.shuffle().await.unwrap();
    let after = h.controller.snapshot();

    assert_eq!(after.current_slot, before.current_slot);
    assert_eq!(current_id(&after), Some("d"));
    assert_eq!(after.queue_len(), ids.len());
}

#[tokio::test]
async fn test_remove_current_while_playing_starts_next() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b"]))
        .await
        .unwrap();
    wait_playing(&h.controller, "a").await;

    let removed = h.controller.remove_at(0).await.unwrap();
    assert_eq!(removed.id().as_str(), "a");
    wait_playing(&h.controller, "b").await;

    h.controller.remove_at(0).await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.transport, TransportState::Ended);
    assert_eq!(snapshot.current_index, None);
}

#[tokio::test]
async fn test_clear_returns_to_idle() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.clear().await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.transport, TransportState::Idle);
    assert_eq!(snapshot.queue_len(), 0);
}

#[tokio::test]
async fn test_track_finished_advances() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b"]))
        .await
        .unwrap();
    wait_playing(&h.controller, "a").await;

    assert_eq!(
        h.controller.track_finished().await.unwrap(),
        SkipOutcome::Advanced
    );
    wait_playing(&h.controller, "b").await;
    assert_eq!(h.controller.track_finished().await.unwrap(), SkipOutcome::Ended);
    assert_eq!(h.controller.snapshot().transport, TransportState::Ended);
}

// ============================================================================
// Stream generations
// ============================================================================

#[tokio::test]
async fn test_late_response_for_skipped_track_is_ignored() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    transport.gate("a");
    let h = spawn_controller(transport.clone(), None);

    h.controller
        .force_play_from_beginning(tracks(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Buffering);

    h.controller.skip_next().await.unwrap();
    wait_playing(&h.controller, "b").await;

    // A's fetch completes only now.
    transport.release("a");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = h.controller.snapshot();
    assert_eq!(current_id(&snapshot), Some("b"));
    assert_eq!(snapshot.transport, TransportState::Playing);
    assert!(h.sink.offsets_for("a").is_empty());
    assert!(!h.sink.offsets_for("b").is_empty());
}

#[tokio::test]
async fn test_stream_failure_moves_to_error() {
    let transport = MemoryTransport::with_tracks(&["b"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["missing", "b"]))
        .await
        .unwrap();
    let snapshot = wait_until(&h.controller, |s| s.transport == TransportState::Error).await;
    assert!(snapshot.last_error.is_some());

    // Navigation still works out of Error.
    h.controller.skip_next().await.unwrap();
    let snapshot = wait_playing(&h.controller, "b").await;
    assert!(snapshot.last_error.is_none());
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_pause_and_resume() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    assert!(matches!(
        h.controller.pause().await,
        Err(PlaybackError::InvalidTransition { .. })
    ));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    wait_playing(&h.controller, "a").await;

    h.controller.pause().await.unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Paused);
    // Pausing twice is harmless.
    h.controller.pause().await.unwrap();

    h.controller.resume().await.unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Playing);

    h.controller.skip_next().await.unwrap_err();
    assert!(matches!(
        h.controller.resume().await,
        Err(PlaybackError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_seek_bounds_and_offset() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    assert!(matches!(
        h.controller.seek(Duration::from_secs(1)).await,
        Err(PlaybackError::NoTrackLoaded)
    ));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    wait_playing(&h.controller, "a").await;

    assert!(matches!(
        h.controller.seek(Duration::from_secs(10)).await,
        Err(PlaybackError::SeekOutOfBounds(_))
    ));

    // Let the first pass deliver all four chunks.
    wait_for_chunks(&h.sink, "a", 4).await;

    h.controller.seek(Duration::from_secs(2)).await.unwrap();
    assert_eq!(h.controller.snapshot().position, Duration::from_secs(2));
    wait_playing(&h.controller, "a").await;

    // Halfway through a 16 byte track is offset 8.
    wait_for_chunks(&h.sink, "a", 6).await;
    assert_eq!(h.sink.offsets_for("a"), vec![0, 4, 8, 12, 8, 12]);
}

async fn wait_for_chunks(sink: &RecordingSink, id: &str, count: usize) {
    tokio::time::timeout(TIMEOUT, async {
        while sink.offsets_for(id).len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("chunks were not delivered");
}

#[tokio::test]
async fn test_seek_while_paused_stays_paused() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    wait_playing(&h.controller, "a").await;
    h.controller.pause().await.unwrap();

    h.controller.seek(Duration::from_secs(1)).await.unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Paused);
}

#[tokio::test]
async fn test_report_progress_clamps_to_duration() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller
        .report_progress(Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(h.controller.snapshot().position, Duration::from_secs(4));
}

#[tokio::test]
async fn test_position_event_saturates_for_huge_durations() {
    let transport = MemoryTransport::with_tracks(&["long"]);
    let mut h = spawn_controller(transport, None);
    let long = Track::new("long", Duration::MAX).with_content_length(TRACK_BYTES as u64);

    h.controller.force_play_from_beginning(vec![long]).await.unwrap();
    h.controller.report_progress(Duration::MAX).await.unwrap();

    loop {
        let event = tokio::time::timeout(TIMEOUT, h.events.recv())
            .await
            .expect("timed out waiting for position")
            .expect("event bus closed");
        if let CoreEvent::Playback(PlaybackEvent::PositionChanged {
            position_ms,
            duration_ms,
            ..
        }) = event
        {
            assert_eq!(position_ms, u64::MAX);
            assert_eq!(duration_ms, u64::MAX);
            break;
        }
    }
}

// ============================================================================
// Radio
// ============================================================================

#[tokio::test]
async fn test_radio_disabled_without_source() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);
    assert!(matches!(
        h.controller.start_radio(TrackId::from("a")).await,
        Err(PlaybackError::RadioDisabled)
    ));
    assert!(!h.controller.stop_radio().await.unwrap());
}

#[tokio::test]
async fn test_radio_extends_queue_until_exhausted() {
    let transport = MemoryTransport::with_tracks(&["a", "r1", "r2"]);
    let radio = Arc::new(ScriptedRadio::new(vec![
        batch(&["r1", "r2"], Some("page-2")),
        batch(&[], None),
    ]));
    let h = spawn_controller(transport, Some(radio));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    assert!(h.controller.snapshot().radio_active);

    wait_until(&h.controller, |s| s.queue_len() == 3).await;
    assert_eq!(h.controller.skip_next().await.unwrap(), SkipOutcome::Advanced);

    // Second fetch comes back empty and ends the session.
    wait_until(&h.controller, |s| !s.radio_active).await;
    assert_eq!(h.controller.skip_next().await.unwrap(), SkipOutcome::Advanced);
    assert!(matches!(
        h.controller.skip_next().await,
        Err(PlaybackError::EndOfQueue)
    ));
}

#[tokio::test]
async fn test_skip_at_end_waits_for_radio_batch() {
    let transport = MemoryTransport::with_tracks(&["a", "r1"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![batch(&["r1"], Some("more"))]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();

    assert_eq!(
        h.controller.skip_next().await.unwrap(),
        SkipOutcome::AwaitingContinuation
    );
    assert_eq!(h.controller.snapshot().transport, TransportState::Buffering);

    radio.release();
    wait_playing(&h.controller, "r1").await;
}

#[tokio::test]
async fn test_pause_while_waiting_holds_next_item_paused() {
    let transport = MemoryTransport::with_tracks(&["a", "r1"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![batch(&["r1"], Some("more"))]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    assert_eq!(
        h.controller.skip_next().await.unwrap(),
        SkipOutcome::AwaitingContinuation
    );
    h.controller.pause().await.unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Paused);

    radio.release();
    let snapshot = wait_until(&h.controller, |s| current_id(s) == Some("r1")).await;
    assert_eq!(snapshot.transport, TransportState::Paused);

    // Nothing reaches the sink until playback is resumed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.controller.snapshot().transport, TransportState::Paused);
    assert!(h.sink.offsets_for("r1").is_empty());

    h.controller.resume().await.unwrap();
    wait_playing(&h.controller, "r1").await;
}

#[tokio::test]
async fn test_removing_waiting_item_cancels_pending_advance() {
    let transport = MemoryTransport::with_tracks(&["a", "b", "r1"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![batch(&["r1"], Some("more"))]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_at_index(tracks(&["a", "b"]), 1)
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("b")).await.unwrap();
    assert_eq!(
        h.controller.skip_next().await.unwrap(),
        SkipOutcome::AwaitingContinuation
    );

    // The cursor falls back onto "a", which starts in place of the wait.
    h.controller.remove_at(1).await.unwrap();
    wait_playing(&h.controller, "a").await;

    radio.release();
    let snapshot = wait_until(&h.controller, |s| s.queue_len() == 2).await;
    assert_eq!(current_id(&snapshot), Some("a"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(current_id(&h.controller.snapshot()), Some("a"));
}

#[tokio::test]
async fn test_seek_while_waiting_cancels_pending_advance() {
    let transport = MemoryTransport::with_tracks(&["a", "r1"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![batch(&["r1"], Some("more"))]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    assert_eq!(
        h.controller.skip_next().await.unwrap(),
        SkipOutcome::AwaitingContinuation
    );

    h.controller.seek(Duration::from_secs(1)).await.unwrap();
    wait_playing(&h.controller, "a").await;

    radio.release();
    let snapshot = wait_until(&h.controller, |s| s.queue_len() == 2).await;
    assert_eq!(current_id(&snapshot), Some("a"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(current_id(&h.controller.snapshot()), Some("a"));
}

#[tokio::test]
async fn test_stop_radio_discards_in_flight_batch() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![batch(&["late"], Some("more"))]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    assert_eq!(
        h.controller.skip_next().await.unwrap(),
        SkipOutcome::AwaitingContinuation
    );

    assert!(h.controller.stop_radio().await.unwrap());
    assert!(!h.controller.stop_radio().await.unwrap());
    assert_eq!(h.controller.snapshot().transport, TransportState::Ended);

    radio.release();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.queue_len(), 1);
    assert!(!snapshot.radio_active);
}

#[tokio::test]
async fn test_radio_failure_while_waiting_ends_playback() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let radio = Arc::new(ScriptedRadio::gated(vec![Err(
        PlaybackError::StreamingFailed("offline".into()),
    )]));
    let h = spawn_controller(transport, Some(radio.clone()));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    h.controller.skip_next().await.unwrap();

    radio.release();
    let snapshot = wait_until(&h.controller, |s| s.transport == TransportState::Ended).await;
    // A failed fetch does not end the session.
    assert!(snapshot.radio_active);
}

#[tokio::test]
async fn test_enqueue_while_waiting_plays_new_item() {
    let transport = MemoryTransport::with_tracks(&["a", "b"]);
    let radio = Arc::new(ScriptedRadio::gated(Vec::new()));
    let h = spawn_controller(transport, Some(radio));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    h.controller.skip_next().await.unwrap();

    h.controller.enqueue(tracks(&["b"])).await.unwrap();
    wait_playing(&h.controller, "b").await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_rejects_later_commands() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    let h = spawn_controller(transport, None);
    let other = h.controller.clone();

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    h.controller.shutdown().await.unwrap();
    // Shutting down twice is fine.
    h.controller.shutdown().await.unwrap();

    assert!(matches!(
        other.skip_next().await,
        Err(PlaybackError::ControllerShutdown)
    ));
    assert!(!other.is_running());
}

#[tokio::test]
async fn test_dropping_every_handle_stops_actor_with_stream_in_flight() {
    let transport = MemoryTransport::with_tracks(&["a"]);
    transport.gate("a");
    let radio = Arc::new(ScriptedRadio::gated(Vec::new()));
    let h = spawn_controller(transport, Some(radio));

    h.controller
        .force_play_from_beginning(tracks(&["a"]))
        .await
        .unwrap();
    // Leaves a radio fetch parked alongside the blocked stream.
    h.controller.start_radio(TrackId::from("a")).await.unwrap();
    assert_eq!(h.controller.snapshot().transport, TransportState::Buffering);

    let Harness {
        controller, task, ..
    } = h;
    drop(controller);

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("controller outlived its last handle")
        .unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let cache = Arc::new(ContentCache::new(CacheConfig::default()));
    let config = PlaybackConfig {
        chunk_size: 0,
        ..Default::default()
    };
    let source = TrackSource::new(cache, MemoryTransport::with_tracks(&[]), &config);
    let err = PlaybackController::builder(source)
        .config(config)
        .spawn()
        .unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidConfig(_)));
}
