//! # Playback Controller
//!
//! Single-writer actor that owns the queue, the radio continuation and the
//! transport state.
//!
//! ## Architecture
//!
//! ```text
//!  PlaybackController (handle, Clone)
//!         │ Command + oneshot reply
//!         ▼
//!  ┌──────────────────────────────┐   watch::Sender<PlaybackSnapshot>
//!  │  ControllerActor (one task)  │ ─────────────────────────────────> observers
//!  │  PlaybackQueue               │
//!  │  RadioContinuation           │
//!  │  TransportState              │
//!  └──────▲───────────────▲───────┘
//!         │ Stream{gen}   │ Radio{session}
//!   stream pump task   radio fetch task
//! ```
//!
//! Commands from every handle and results from background work share one
//! mailbox, so all state transitions are linearised. Background results
//! carry the stream generation or radio session they belong to; anything
//! tagged with an outdated value is dropped before it can touch state.

mod pump;
mod state;

pub use state::{PlaybackSnapshot, TransportState};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::PlaybackQueue;
use crate::radio::{RadioContinuation, RadioOutcome, RadioSessionId};
use crate::source::TrackSource;
use crate::traits::{AudioSink, NullSink, RadioBatch, RadioSource};
use core_async::sync::{mpsc, oneshot, watch, CancellationToken};
use core_async::task::JoinHandle;
use core_library::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent, RadioEvent};
use pump::{ActiveStream, StreamReport};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Result of moving past the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The cursor moved and the new item is buffering.
    Advanced,
    /// The queue is at its end and a radio batch is on the way; the next
    /// item starts when it arrives.
    AwaitingContinuation,
    /// Nothing follows; transport moved to `Ended`.
    Ended,
}

// ============================================================================
// Mailbox
// ============================================================================

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub(crate) enum Command {
    ForcePlay {
        tracks: Vec<Track>,
        index: usize,
        respond_to: Reply<()>,
    },
    Enqueue {
        tracks: Vec<Track>,
        respond_to: Reply<usize>,
    },
    PlayNext {
        tracks: Vec<Track>,
        respond_to: Reply<usize>,
    },
    Shuffle {
        respond_to: Reply<()>,
    },
    JumpTo {
        index: usize,
        respond_to: Reply<()>,
    },
    RemoveAt {
        index: usize,
        respond_to: Reply<Track>,
    },
    Clear {
        respond_to: Reply<()>,
    },
    StartRadio {
        seed: TrackId,
        respond_to: Reply<()>,
    },
    StopRadio {
        respond_to: Reply<bool>,
    },
    SkipNext {
        respond_to: Reply<SkipOutcome>,
    },
    SkipPrevious {
        respond_to: Reply<()>,
    },
    Seek {
        position: Duration,
        respond_to: Reply<()>,
    },
    Pause {
        respond_to: Reply<()>,
    },
    Resume {
        respond_to: Reply<()>,
    },
    TrackFinished {
        respond_to: Reply<SkipOutcome>,
    },
    ReportProgress {
        position: Duration,
        respond_to: Reply<()>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

#[derive(Debug)]
pub(crate) enum Message {
    Command(Command),
    Stream {
        generation: u64,
        report: StreamReport,
    },
    Radio {
        session: RadioSessionId,
        result: Result<RadioBatch>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to the controller actor.
#[derive(Clone)]
pub struct PlaybackController {
    sender: mpsc::Sender<Message>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackController {
    pub fn builder(source: TrackSource) -> PlaybackControllerBuilder {
        PlaybackControllerBuilder::new(source)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(Message::Command(make(respond_to)))
            .await
            .map_err(|_| PlaybackError::ControllerShutdown)?;
        response
            .await
            .map_err(|_| PlaybackError::ControllerShutdown)?
    }

    /// Replace the queue and start its first item.
    pub async fn force_play_from_beginning(&self, tracks: Vec<Track>) -> Result<()> {
        self.force_play_at_index(tracks, 0).await
    }

    /// Replace the queue and start the item at `index` (clamped).
    pub async fn force_play_at_index(&self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.request(|respond_to| Command::ForcePlay {
            tracks,
            index,
            respond_to,
        })
        .await
    }

    /// Append to the queue. Never starts playback.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<usize> {
        self.request(|respond_to| Command::Enqueue { tracks, respond_to })
            .await
    }

    /// Insert right after the current item.
    pub async fn play_next(&self, tracks: Vec<Track>) -> Result<usize> {
        self.request(|respond_to| Command::PlayNext { tracks, respond_to })
            .await
    }

    pub async fn shuffle(&self) -> Result<()> {
        self.request(|respond_to| Command::Shuffle { respond_to })
            .await
    }

    pub async fn jump_to(&self, index: usize) -> Result<()> {
        self.request(|respond_to| Command::JumpTo { index, respond_to })
            .await
    }

    /// Remove the item at `index`, returning its track.
    pub async fn remove_at(&self, index: usize) -> Result<Track> {
        self.request(|respond_to| Command::RemoveAt { index, respond_to })
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|respond_to| Command::Clear { respond_to }).await
    }

    pub async fn start_radio(&self, seed: TrackId) -> Result<()> {
        self.request(|respond_to| Command::StartRadio { seed, respond_to })
            .await
    }

    /// Returns whether a radio session was active.
    pub async fn stop_radio(&self) -> Result<bool> {
        self.request(|respond_to| Command::StopRadio { respond_to })
            .await
    }

    /// # Errors
    ///
    /// `EndOfQueue` after moving to `Ended` when nothing follows,
    /// `EmptyQueue` when there is nothing to play.
    pub async fn skip_next(&self) -> Result<SkipOutcome> {
        self.request(|respond_to| Command::SkipNext { respond_to })
            .await
    }

    /// `StartOfQueue` at the first item, leaving state untouched.
    pub async fn skip_previous(&self) -> Result<()> {
        self.request(|respond_to| Command::SkipPrevious { respond_to })
            .await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|respond_to| Command::Seek {
            position,
            respond_to,
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|respond_to| Command::Pause { respond_to })
            .await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|respond_to| Command::Resume { respond_to })
            .await
    }

    /// The output stage reached the end of the current item.
    pub async fn track_finished(&self) -> Result<SkipOutcome> {
        self.request(|respond_to| Command::TrackFinished { respond_to })
            .await
    }

    pub async fn report_progress(&self, position: Duration) -> Result<()> {
        self.request(|respond_to| Command::ReportProgress {
            position,
            respond_to,
        })
        .await
    }

    /// Latest published state. Reflects at least every command whose reply
    /// this caller has already received.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Cancel in-flight work and stop the actor. Later calls on any handle
    /// return `ControllerShutdown`.
    pub async fn shutdown(&self) -> Result<()> {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(Message::Command(Command::Shutdown { respond_to }))
            .await
            .is_err()
        {
            return Ok(());
        }
        let _ = response.await;
        Ok(())
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("running", &self.is_running())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct PlaybackControllerBuilder {
    source: TrackSource,
    config: PlaybackConfig,
    radio_source: Option<Arc<dyn RadioSource>>,
    sink: Arc<dyn AudioSink>,
    event_bus: Option<EventBus>,
}

impl PlaybackControllerBuilder {
    fn new(source: TrackSource) -> Self {
        Self {
            source,
            config: PlaybackConfig::default(),
            radio_source: None,
            sink: Arc::new(NullSink),
            event_bus: None,
        }
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn radio_source(mut self, source: Arc<dyn RadioSource>) -> Self {
        self.radio_source = Some(source);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Start the actor task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> Result<(PlaybackController, JoinHandle<()>)> {
        self.config.validate().map_err(PlaybackError::InvalidConfig)?;

        let (sender, receiver) = mpsc::channel(self.config.command_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());

        let radio = match (self.config.enable_radio, self.radio_source) {
            (true, Some(source)) => Some(RadioContinuation::new(
                source,
                self.config.radio_batch_limit,
            )),
            _ => None,
        };

        let actor = ControllerActor {
            queue: PlaybackQueue::new(),
            radio,
            source: self.source,
            sink: self.sink,
            config: self.config,
            event_bus: self.event_bus,
            receiver,
            mailbox: sender.downgrade(),
            snapshot: snapshot_tx,
            shutdown: CancellationToken::new(),
            transport: TransportState::Idle,
            position: Duration::ZERO,
            generation: 0,
            stream: None,
            awaiting_continuation: false,
            last_error: None,
        };

        let handle = core_async::spawn(actor.run());
        Ok((
            PlaybackController {
                sender,
                snapshot: snapshot_rx,
            },
            handle,
        ))
    }
}

// ============================================================================
// Actor
// ============================================================================

struct ControllerActor {
    queue: PlaybackQueue,
    radio: Option<RadioContinuation>,
    source: TrackSource,
    sink: Arc<dyn AudioSink>,
    config: PlaybackConfig,
    event_bus: Option<EventBus>,
    receiver: mpsc::Receiver<Message>,
    mailbox: mpsc::WeakSender<Message>,
    snapshot: watch::Sender<PlaybackSnapshot>,
    shutdown: CancellationToken,
    transport: TransportState,
    position: Duration,
    generation: u64,
    stream: Option<ActiveStream>,
    awaiting_continuation: bool,
    last_error: Option<String>,
}

impl ControllerActor {
    async fn run(mut self) {
        info!("Playback controller started");

        while let Some(message) = self.receiver.recv().await {
            match message {
                Message::Command(command) => {
                    if self.handle_command(command).is_break() {
                        break;
                    }
                }
                Message::Stream { generation, report } => {
                    self.handle_stream_report(generation, report);
                    self.publish();
                }
                Message::Radio { session, result } => {
                    self.handle_radio_result(session, result);
                    self.publish();
                }
            }
        }

        self.teardown();
        info!("Playback controller stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::ForcePlay {
                tracks,
                index,
                respond_to,
            } => {
                let result = self.force_play(tracks, index);
                self.reply(respond_to, result);
            }
            Command::Enqueue { tracks, respond_to } => {
                let count = self.enqueue(tracks);
                self.reply(respond_to, Ok(count));
            }
            Command::PlayNext { tracks, respond_to } => {
                let count = self.play_next(tracks);
                self.reply(respond_to, Ok(count));
            }
            Command::Shuffle { respond_to } => {
                self.queue.shuffle();
                debug!(len = self.queue.len(), "Queue shuffled");
                self.emit(CoreEvent::Queue(QueueEvent::Shuffled {
                    len: self.queue.len(),
                }));
                self.reply(respond_to, Ok(()));
            }
            Command::JumpTo { index, respond_to } => {
                let result = self.jump_to(index);
                self.reply(respond_to, result);
            }
            Command::RemoveAt { index, respond_to } => {
                let result = self.remove_at(index);
                self.reply(respond_to, result);
            }
            Command::Clear { respond_to } => {
                self.clear();
                self.reply(respond_to, Ok(()));
            }
            Command::StartRadio { seed, respond_to } => {
                let result = self.start_radio(seed);
                self.reply(respond_to, result);
            }
            Command::StopRadio { respond_to } => {
                let was_active = self.stop_radio();
                self.reply(respond_to, Ok(was_active));
            }
            Command::SkipNext { respond_to } => {
                let result = self.skip_next();
                self.reply(respond_to, result);
            }
            Command::SkipPrevious { respond_to } => {
                let result = self.skip_previous();
                self.reply(respond_to, result);
            }
            Command::Seek {
                position,
                respond_to,
            } => {
                let result = self.seek(position);
                self.reply(respond_to, result);
            }
            Command::Pause { respond_to } => {
                let result = self.pause();
                self.reply(respond_to, result);
            }
            Command::Resume { respond_to } => {
                let result = self.resume();
                self.reply(respond_to, result);
            }
            Command::TrackFinished { respond_to } => {
                let result = self.track_finished();
                self.reply(respond_to, result);
            }
            Command::ReportProgress {
                position,
                respond_to,
            } => {
                let result = self.report_progress(position);
                self.reply(respond_to, result);
            }
            Command::Shutdown { respond_to } => {
                self.teardown();
                let _ = respond_to.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Publish before answering so a caller that awaited the reply always
    /// observes its own change in the snapshot.
    fn reply<T>(&self, respond_to: Reply<T>, result: Result<T>) {
        self.publish();
        let _ = respond_to.send(result);
    }

    // ------------------------------------------------------------------------
    // Queue operations
    // ------------------------------------------------------------------------

    #[instrument(skip(self, tracks), fields(len = tracks.len()))]
    fn force_play(&mut self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.awaiting_continuation = false;
        let cursor = self.queue.replace(tracks, index);
        self.emit(CoreEvent::Queue(QueueEvent::Replaced {
            len: self.queue.len(),
            cursor,
        }));
        if cursor.is_some() {
            self.start_current();
            self.check_continuation();
        } else {
            self.stop_stream();
            self.set_transport(TransportState::Idle);
        }
        Ok(())
    }

    fn enqueue(&mut self, tracks: Vec<Track>) -> usize {
        let count = self.queue.append(tracks);
        debug!(count, len = self.queue.len(), "Tracks enqueued");
        self.emit(CoreEvent::Queue(QueueEvent::Appended {
            count,
            len: self.queue.len(),
        }));
        self.resume_if_awaiting();
        self.check_continuation();
        count
    }

    fn play_next(&mut self, tracks: Vec<Track>) -> usize {
        let count = self.queue.insert_after_current(tracks);
        self.emit(CoreEvent::Queue(QueueEvent::InsertedNext {
            count,
            len: self.queue.len(),
        }));
        self.resume_if_awaiting();
        count
    }

    fn jump_to(&mut self, index: usize) -> Result<()> {
        self.queue.jump_to(index)?;
        self.awaiting_continuation = false;
        self.emit(CoreEvent::Queue(QueueEvent::CursorMoved { index }));
        self.start_current();
        self.check_continuation();
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<Track> {
        let was_current = self.queue.cursor() == Some(index);
        let removed = self.queue.remove_at(index)?;
        self.emit(CoreEvent::Queue(QueueEvent::ItemRemoved {
            index,
            cursor: self.queue.cursor(),
        }));

        if was_current && self.transport.is_active() {
            self.awaiting_continuation = false;
            if self.queue.current().is_some() {
                self.start_current();
            } else {
                self.stop_stream();
                self.set_transport(TransportState::Ended);
                self.emit(CoreEvent::Playback(PlaybackEvent::Ended));
            }
        }
        self.check_continuation();
        Ok(removed.track().clone())
    }

    fn clear(&mut self) {
        self.stop_stream();
        self.queue.clear();
        self.awaiting_continuation = false;
        self.position = Duration::ZERO;
        self.emit(CoreEvent::Queue(QueueEvent::Cleared));
        self.set_transport(TransportState::Idle);
    }

    // ------------------------------------------------------------------------
    // Radio
    // ------------------------------------------------------------------------

    fn start_radio(&mut self, seed: TrackId) -> Result<()> {
        let radio = self.radio.as_mut().ok_or(PlaybackError::RadioDisabled)?;
        radio.start(seed.clone());
        self.emit(CoreEvent::Radio(RadioEvent::Started {
            seed_track_id: seed.to_string(),
        }));
        self.check_continuation();
        Ok(())
    }

    fn stop_radio(&mut self) -> bool {
        let was_active = self.radio.as_mut().is_some_and(|radio| radio.stop());
        if was_active {
            self.emit(CoreEvent::Radio(RadioEvent::Stopped));
        }
        if self.awaiting_continuation {
            self.awaiting_continuation = false;
            self.end_playback();
        }
        was_active
    }

    /// Start a continuation fetch when radio is active and the queue is at
    /// or below the low-water mark. Returns whether a fetch is outstanding.
    fn check_continuation(&mut self) -> bool {
        let remaining = self.queue.remaining_after_cursor();
        let low_water_mark = self.config.low_water_mark;
        let Some(radio) = self.radio.as_mut() else {
            return false;
        };
        if let Some(request) = radio.plan(remaining, low_water_mark) {
            let source = radio.source();
            let shutdown = self.shutdown.clone();
            // Weak, so a pending fetch never keeps the actor alive.
            let mailbox = self.mailbox.clone();
            core_async::spawn(async move {
                let result = core_async::select! {
                    _ = shutdown.cancelled() => return,
                    result = request.execute(source.as_ref()) => result,
                };
                if let Some(mailbox) = mailbox.upgrade() {
                    let _ = mailbox
                        .send(Message::Radio {
                            session: request.session,
                            result,
                        })
                        .await;
                }
            });
        }
        radio.is_fetching()
    }

    fn handle_radio_result(&mut self, session: RadioSessionId, result: Result<RadioBatch>) {
        let Some(radio) = self.radio.as_mut() else {
            return;
        };
        let seed = radio.seed().map(ToString::to_string).unwrap_or_default();

        match radio.apply(session, result) {
            RadioOutcome::Stale => {}
            RadioOutcome::Batch { tracks, exhausted } => {
                if !tracks.is_empty() {
                    let count = self.queue.append(tracks);
                    info!(count, seed = %seed, "Radio batch appended");
                    self.emit(CoreEvent::Queue(QueueEvent::Appended {
                        count,
                        len: self.queue.len(),
                    }));
                    self.emit(CoreEvent::Radio(RadioEvent::BatchAppended {
                        seed_track_id: seed.clone(),
                        count,
                    }));
                }
                if exhausted {
                    self.emit(CoreEvent::Radio(RadioEvent::Exhausted {
                        seed_track_id: seed,
                    }));
                }
                if self.awaiting_continuation {
                    if self.continue_after_wait().is_none() {
                        self.end_playback();
                    }
                } else {
                    self.check_continuation();
                }
            }
            RadioOutcome::Failed(e) => {
                self.emit(CoreEvent::Radio(RadioEvent::FetchFailed {
                    message: e.to_string(),
                }));
                if self.awaiting_continuation {
                    self.awaiting_continuation = false;
                    self.end_playback();
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    fn skip_next(&mut self) -> Result<SkipOutcome> {
        if self.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        match self.move_forward() {
            SkipOutcome::Ended => Err(PlaybackError::EndOfQueue),
            outcome => Ok(outcome),
        }
    }

    fn track_finished(&mut self) -> Result<SkipOutcome> {
        let Some(item) = self.queue.current() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        if !self.transport.is_active() {
            return Err(self.invalid_transition("finish a track"));
        }
        self.emit(CoreEvent::Playback(PlaybackEvent::TrackFinished {
            track_id: item.track().id().to_string(),
        }));
        Ok(self.move_forward())
    }

    /// Advance, ask the radio for more at the end, or end playback.
    fn move_forward(&mut self) -> SkipOutcome {
        if self.advance_and_start().is_some() {
            return SkipOutcome::Advanced;
        }
        if self.check_continuation() {
            debug!("Queue exhausted, waiting for radio continuation");
            self.stop_stream();
            self.awaiting_continuation = true;
            self.set_transport(TransportState::Buffering);
            return SkipOutcome::AwaitingContinuation;
        }
        self.end_playback();
        SkipOutcome::Ended
    }

    /// Move the cursor forward and start the new item.
    fn advance_and_start(&mut self) -> Option<usize> {
        self.advance_and_load(false)
    }

    fn advance_and_load(&mut self, paused: bool) -> Option<usize> {
        self.queue.advance().ok()?;
        let cursor = self.queue.cursor()?;
        self.emit(CoreEvent::Queue(QueueEvent::CursorMoved { index: cursor }));
        self.load_current(paused);
        self.check_continuation();
        Some(cursor)
    }

    /// Leave the wait for a continuation. A pause requested while waiting
    /// carries over to the next item.
    fn continue_after_wait(&mut self) -> Option<usize> {
        self.awaiting_continuation = false;
        let paused = self.transport == TransportState::Paused;
        self.advance_and_load(paused)
    }

    fn resume_if_awaiting(&mut self) {
        if self.awaiting_continuation && self.queue.remaining_after_cursor() > 0 {
            self.continue_after_wait();
        }
    }

    fn skip_previous(&mut self) -> Result<()> {
        self.queue.retreat()?;
        self.awaiting_continuation = false;
        if let Some(index) = self.queue.cursor() {
            self.emit(CoreEvent::Queue(QueueEvent::CursorMoved { index }));
        }
        self.start_current();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    fn seek(&mut self, position: Duration) -> Result<()> {
        let Some(item) = self.queue.current() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        if !self.transport.is_active() {
            return Err(self.invalid_transition("seek"));
        }
        let track = item.track().clone();
        if position > track.duration() {
            return Err(PlaybackError::SeekOutOfBounds(position));
        }

        let content_length = self
            .source
            .cache()
            .content_length(track.id())
            .or(track.content_length());
        let offset = byte_offset_for(position, track.duration(), content_length);
        debug!(track_id = %track.id(), ?position, offset, "Seeking");

        let paused = self.transport == TransportState::Paused;
        self.awaiting_continuation = false;
        self.open_stream(&track, offset, paused);
        self.position = position;
        if !paused {
            self.set_transport(TransportState::Buffering);
        }
        self.emit_position(&track);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        match self.transport {
            TransportState::Paused => Ok(()),
            TransportState::Buffering | TransportState::Playing => {
                if let Some(stream) = &self.stream {
                    stream.set_paused(true);
                }
                self.set_transport(TransportState::Paused);
                Ok(())
            }
            _ => Err(self.invalid_transition("pause")),
        }
    }

    fn resume(&mut self) -> Result<()> {
        match self.transport {
            TransportState::Playing | TransportState::Buffering => Ok(()),
            TransportState::Paused => {
                let next = match &self.stream {
                    Some(stream) => {
                        stream.set_paused(false);
                        if stream.first_chunk_seen {
                            TransportState::Playing
                        } else {
                            TransportState::Buffering
                        }
                    }
                    None => TransportState::Buffering,
                };
                self.set_transport(next);
                Ok(())
            }
            _ => Err(self.invalid_transition("resume")),
        }
    }

    fn report_progress(&mut self, position: Duration) -> Result<()> {
        let Some(item) = self.queue.current() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let track = item.track().clone();
        self.position = position.min(track.duration());
        self.emit_position(&track);
        Ok(())
    }

    fn handle_stream_report(&mut self, generation: u64, report: StreamReport) {
        let current = self
            .stream
            .as_ref()
            .is_some_and(|stream| stream.generation == generation);
        if !current {
            debug!(generation, current = self.generation, "Discarding stale stream report");
            return;
        }

        match report {
            StreamReport::FirstChunk => {
                if let Some(stream) = self.stream.as_mut() {
                    stream.first_chunk_seen = true;
                }
                if self.transport == TransportState::Buffering {
                    self.set_transport(TransportState::Playing);
                }
            }
            StreamReport::Finished => {
                debug!(generation, "Stream fully delivered");
            }
            StreamReport::Failed(e) => {
                let track_id = self
                    .queue
                    .current()
                    .map(|item| item.track().id().to_string())
                    .unwrap_or_default();
                error!(generation, track_id = %track_id, error = %e, "Stream failed");
                self.stop_stream();
                self.last_error = Some(e.to_string());
                self.emit(CoreEvent::Playback(PlaybackEvent::StreamFailed {
                    track_id,
                    message: e.to_string(),
                    recoverable: e.is_transient(),
                }));
                self.set_transport(TransportState::Error);
            }
        }
    }

    /// Reset the transport onto the current item.
    fn start_current(&mut self) {
        self.load_current(false);
    }

    /// Open the current item from the start, either playing or held paused.
    fn load_current(&mut self, paused: bool) {
        let Some(item) = self.queue.current() else {
            self.stop_stream();
            self.set_transport(TransportState::Idle);
            return;
        };
        let track = item.track().clone();
        let slot_id = item.slot_id();

        self.last_error = None;
        self.position = Duration::ZERO;
        self.open_stream(&track, 0, paused);
        self.emit(CoreEvent::Playback(PlaybackEvent::TrackStarted {
            track_id: track.id().to_string(),
            slot_id: slot_id.value(),
        }));
        self.set_transport(if paused {
            TransportState::Paused
        } else {
            TransportState::Buffering
        });
    }

    /// Cancel the old stream and open a new generation for `track`.
    fn open_stream(&mut self, track: &Track, offset: u64, paused: bool) {
        self.stop_stream();
        self.generation += 1;
        let cancel = self.shutdown.child_token();
        let stream = self.source.open_stream(track, offset, cancel.clone());
        self.stream = Some(pump::spawn(
            self.generation,
            stream,
            self.sink.clone(),
            paused,
            cancel,
            self.mailbox.clone(),
        ));
    }

    fn stop_stream(&mut self) {
        // Dropping the handle cancels the pump.
        self.stream.take();
    }

    fn end_playback(&mut self) {
        self.stop_stream();
        if self.transport != TransportState::Ended {
            self.set_transport(TransportState::Ended);
            self.emit(CoreEvent::Playback(PlaybackEvent::Ended));
        }
    }

    fn set_transport(&mut self, to: TransportState) {
        if self.transport == to {
            return;
        }
        debug!(from = %self.transport, to = %to, "Transport transition");
        self.emit(CoreEvent::Playback(PlaybackEvent::TransportChanged {
            from: self.transport.to_string(),
            to: to.to_string(),
        }));
        self.transport = to;
    }

    fn invalid_transition(&self, action: &str) -> PlaybackError {
        PlaybackError::InvalidTransition {
            from: self.transport.to_string(),
            action: action.to_string(),
        }
    }

    fn emit_position(&self, track: &Track) {
        self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
            track_id: track.id().to_string(),
            position_ms: duration_millis(self.position),
            duration_ms: duration_millis(track.duration()),
        }));
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(event);
        }
    }

    fn publish(&self) {
        let current = self.queue.current();
        self.snapshot.send_replace(PlaybackSnapshot {
            transport: self.transport,
            current_slot: current.map(|item| item.slot_id()),
            current_track: current.map(|item| item.track().id().clone()),
            current_index: self.queue.cursor(),
            position: self.position,
            queue: self.queue.snapshot(),
            radio_active: self.radio.as_ref().is_some_and(|radio| radio.is_active()),
            last_error: self.last_error.clone(),
        });
    }

    fn teardown(&mut self) {
        self.stop_stream();
        self.shutdown.cancel();
        if let Some(radio) = self.radio.as_mut() {
            radio.stop();
        }
        self.receiver.close();
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Estimated byte offset for a time position, assuming constant bitrate.
fn byte_offset_for(position: Duration, duration: Duration, content_length: Option<u64>) -> u64 {
    match content_length {
        Some(len) if !duration.is_zero() => {
            let offset =
                u128::from(len).saturating_mul(position.as_millis()) / duration.as_millis().max(1);
            u64::try_from(offset).unwrap_or(u64::MAX).min(len)
        }
        _ => 0,
    }
}
