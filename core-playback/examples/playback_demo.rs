//! # Playback Controller Demo
//!
//! Plays a short queue over an in-memory transport, lets a scripted radio
//! extend it, and prints every state change.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bytes::Bytes;
use core_library::{Track, TrackId, TrackMetadata};
use core_playback::traits::{
    AudioSink, AudioTransport, ContinuationCursor, FetchedChunk, RadioBatch, RadioSource,
};
use core_playback::{
    CacheConfig, ContentCache, PlaybackConfig, PlaybackController, Result, SkipOutcome,
    TrackSource, TransportState,
};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TRACK_BYTES: u64 = 256 * 1024;

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Synthesizes deterministic bytes for any track, with a little latency.
struct SyntheticTransport;

#[async_trait]
impl AudioTransport for SyntheticTransport {
    async fn fetch_range(
        &self,
        track_id: &TrackId,
        offset: u64,
        max_len: u64,
    ) -> Result<FetchedChunk> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if offset >= TRACK_BYTES {
            return Ok(FetchedChunk::end(Some(TRACK_BYTES)));
        }
        let seed = track_id.as_str().len() as u64;
        let end = (offset + max_len).min(TRACK_BYTES);
        let data: Bytes = (offset..end).map(|i| ((i + seed) % 256) as u8).collect();
        Ok(FetchedChunk::new(data, Some(TRACK_BYTES)))
    }
}

/// Two pages of recommendations, then nothing.
struct ScriptedRadio {
    calls: AtomicUsize,
}

#[async_trait]
impl RadioSource for ScriptedRadio {
    async fn fetch_batch(
        &self,
        seed: &TrackId,
        cursor: &ContinuationCursor,
        limit: usize,
    ) -> Result<RadioBatch> {
        let page = self.calls.fetch_add(1, Ordering::SeqCst);
        println!("  radio: fetching page {} for {} ({:?}, limit {})", page, seed, cursor, limit);
        match page {
            0 => Ok(RadioBatch::new(
                vec![demo_track("radio-1", "Night Drive"), demo_track("radio-2", "Low Tide")],
                Some("page-2".to_string()),
            )),
            1 => Ok(RadioBatch::new(vec![demo_track("radio-3", "Afterglow")], None)),
            _ => Ok(RadioBatch::exhausted()),
        }
    }
}

/// Counts delivered bytes instead of decoding them.
#[derive(Default)]
struct CountingSink {
    bytes: AtomicUsize,
}

#[async_trait]
impl AudioSink for CountingSink {
    async fn on_chunk(&self, _track_id: &TrackId, _offset: u64, chunk: Bytes) -> Result<()> {
        self.bytes.fetch_add(chunk.len(), Ordering::Relaxed);
        Ok(())
    }

    async fn on_stop(&self, track_id: &TrackId) {
        println!("  sink: stopped {}", track_id);
    }
}

fn demo_track(id: &str, title: &str) -> Track {
    Track::new(id, Duration::from_secs(180)).with_metadata(TrackMetadata::titled(title))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("core_playback=debug"),
    )?;

    let config = PlaybackConfig::low_latency();
    let cache = Arc::new(ContentCache::new(
        CacheConfig::new().with_max_bytes(4 * TRACK_BYTES),
    ));
    let source = TrackSource::new(cache.clone(), Arc::new(SyntheticTransport), &config);
    let sink = Arc::new(CountingSink::default());

    let (controller, task) = PlaybackController::builder(source)
        .config(config)
        .radio_source(Arc::new(ScriptedRadio {
            calls: AtomicUsize::new(0),
        }))
        .sink(sink.clone())
        .spawn()?;

    // Print every published snapshot.
    let mut updates = controller.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = None;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            let line = (snapshot.transport, snapshot.current_track.clone(), snapshot.queue_len());
            if last.as_ref() != Some(&line) {
                println!(
                    "state: {:<9} current: {:<8} queue: {}",
                    snapshot.transport.as_str(),
                    snapshot
                        .current_track
                        .as_ref()
                        .map(TrackId::as_str)
                        .unwrap_or("-"),
                    snapshot.queue_len()
                );
                last = Some(line);
            }
        }
    });

    println!("== Play an album");
    controller
        .force_play_from_beginning(vec![
            demo_track("album-1", "Opening"),
            demo_track("album-2", "Interlude"),
        ])
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("== Start radio from the current track");
    controller.start_radio(TrackId::from("album-1")).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("== Skip through everything");
    loop {
        match controller.skip_next().await {
            Ok(SkipOutcome::Advanced) => {}
            Ok(SkipOutcome::AwaitingContinuation) => println!("  waiting for radio"),
            Ok(SkipOutcome::Ended) | Err(_) => break,
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        if controller.snapshot().transport == TransportState::Ended {
            break;
        }
    }

    let stats = cache.stats();
    println!(
        "== Done: {} bytes delivered, cache holds {} bytes in {} entries ({} hits, {} misses)",
        sink.bytes.load(Ordering::Relaxed),
        cache.resident_bytes(),
        cache.entry_count(),
        stats.hits,
        stats.misses
    );

    controller.shutdown().await?;
    task.await?;
    printer.await?;
    Ok(())
}
