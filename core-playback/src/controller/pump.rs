//! Per-stream task that moves bytes from a `ByteStream` into the sink.

use super::Message;
use crate::error::PlaybackError;
use crate::source::ByteStream;
use crate::traits::AudioSink;
use core_async::sync::{mpsc, watch, CancellationToken};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What a pump tells the controller. Tagged with the stream generation by
/// [`Message::Stream`].
#[derive(Debug)]
pub(crate) enum StreamReport {
    FirstChunk,
    Finished,
    Failed(PlaybackError),
}

/// Controller-side handle to a running pump.
#[derive(Debug)]
pub(crate) struct ActiveStream {
    pub generation: u64,
    pub cancel: CancellationToken,
    pub paused: watch::Sender<bool>,
    pub first_chunk_seen: bool,
}

impl ActiveStream {
    pub fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the pump for one stream generation.
pub(crate) fn spawn(
    generation: u64,
    stream: ByteStream,
    sink: Arc<dyn AudioSink>,
    start_paused: bool,
    cancel: CancellationToken,
    mailbox: mpsc::WeakSender<Message>,
) -> ActiveStream {
    let (paused_tx, paused_rx) = watch::channel(start_paused);
    core_async::spawn(run(
        generation,
        stream,
        sink,
        paused_rx,
        cancel.clone(),
        mailbox,
    ));
    ActiveStream {
        generation,
        cancel,
        paused: paused_tx,
        first_chunk_seen: false,
    }
}

async fn run(
    generation: u64,
    mut stream: ByteStream,
    sink: Arc<dyn AudioSink>,
    mut paused: watch::Receiver<bool>,
    cancel: CancellationToken,
    mailbox: mpsc::WeakSender<Message>,
) {
    let track_id = stream.track_id().clone();
    let mut first_chunk = true;
    debug!(generation, track_id = %track_id, "Stream pump started");

    let outcome = loop {
        // Hold off while paused.
        while *paused.borrow_and_update() {
            core_async::select! {
                _ = cancel.cancelled() => break,
                changed = paused.changed() => if changed.is_err() { break },
            }
        }
        if cancel.is_cancelled() {
            break None;
        }

        let offset = stream.position();
        let chunk = core_async::select! {
            biased;
            _ = cancel.cancelled() => break None,
            chunk = stream.next_chunk() => chunk,
        };

        match chunk {
            Ok(Some(bytes)) => {
                if first_chunk {
                    first_chunk = false;
                    send_report(&mailbox, generation, StreamReport::FirstChunk).await;
                }
                trace!(generation, offset, len = bytes.len(), "Delivering chunk");
                if let Err(e) = sink.on_chunk(&track_id, offset, bytes).await {
                    warn!(generation, track_id = %track_id, error = %e, "Sink rejected chunk");
                    break Some(StreamReport::Failed(e));
                }
            }
            Ok(None) => break Some(StreamReport::Finished),
            Err(PlaybackError::Cancelled) => break None,
            Err(e) => break Some(StreamReport::Failed(e)),
        }
    };

    sink.on_stop(&track_id).await;
    if let Some(report) = outcome {
        send_report(&mailbox, generation, report).await;
    }
    debug!(generation, track_id = %track_id, "Stream pump stopped");
}

/// Upgrades only for the send, so a running pump never keeps the actor
/// alive once every handle is gone.
async fn send_report(mailbox: &mpsc::WeakSender<Message>, generation: u64, report: StreamReport) {
    let Some(mailbox) = mailbox.upgrade() else {
        return;
    };
    let _ = mailbox.send(Message::Stream { generation, report }).await;
}
