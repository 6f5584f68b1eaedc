//! Pipeline stage loops: synthesis producer, playback consumer, filler.
//!
//! The stages share nothing but two bounded channels and the cancellation
//! token. The producer always pushes exactly one [`AudioItem::Done`]
//! marker as its final act — completed, failed, or cancelled — which is
//! what lets the consumer terminate deterministically. `stop()`-driven
//! drains must preserve that marker (see [`drain_queues`]).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use vocstream_core::{AudioSink, PipelineConfig, SpeechSynthesizer, SynthesisOptions, Waveform};

use crate::artifact::{Artifact, ArtifactStore};
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::segment::{Segment, preview_of, sanitize_text, sentence_units};

/// Items flowing through the audio queue.
#[derive(Debug)]
pub(crate) enum AudioItem {
    /// A rendered chunk awaiting playback.
    Artifact(Artifact),

    /// Terminal marker: no further items will arrive.
    Done,
}

/// What the producer's text feed returned.
pub(crate) enum Feed {
    /// A chunk of text to synthesize.
    Text(String),

    /// Nothing yet — poll again (after re-checking cancellation).
    Retry,

    /// The feed is exhausted; wind the stage down.
    End,
}

// ── Synthesis (producer) ───────────────────────────────────────────

/// Synthesis stage body.
///
/// Pulls text from `next_text`, renders it, and pushes artifacts onto
/// the audio queue in sequence order. Sequence numbering starts at 1 and
/// is local to this producer — one producer per pipeline instance.
pub(crate) fn run_producer(
    mut next_text: impl FnMut() -> Feed,
    audio_tx: &Sender<AudioItem>,
    synth: &dyn SpeechSynthesizer,
    store: &ArtifactStore,
    config: &PipelineConfig,
    cancel: &CancelToken,
) {
    let mut seq: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let text = match next_text() {
            Feed::Text(text) => text,
            Feed::Retry => continue,
            Feed::End => break,
        };

        seq += 1;
        let segment = Segment::new(seq, text);
        let started = Instant::now();

        match synthesize_segment(synth, store, config, cancel, &segment) {
            Ok(Some(artifact)) => {
                tracing::info!(
                    seq,
                    preview = %artifact.preview,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Synthesized chunk"
                );
                if !push_artifact(audio_tx, artifact, store, config.poll_interval(), cancel) {
                    break;
                }
            }
            // Blank after sanitization, or cancelled mid-segment.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(seq, error = %e, "Failed to render chunk, skipping");
            }
        }
    }

    // Terminal marker — pushed exactly once, no matter how the loop ended.
    let _ = audio_tx.send(AudioItem::Done);
    tracing::debug!("Synthesis stage finished");
}

/// Render one segment to an artifact.
///
/// Returns `Ok(None)` when the segment sanitizes to nothing, produces no
/// usable audio, or cancellation interrupted it.
fn synthesize_segment(
    synth: &dyn SpeechSynthesizer,
    store: &ArtifactStore,
    config: &PipelineConfig,
    cancel: &CancelToken,
    segment: &Segment,
) -> Result<Option<Artifact>, PipelineError> {
    let Some(waveform) = synthesize_text(
        synth,
        &config.synthesis,
        config.min_unit_length,
        cancel,
        &segment.text,
    ) else {
        return Ok(None);
    };

    let artifact = store.persist(segment.seq, &waveform, segment.preview())?;
    Ok(Some(artifact))
}

/// Sanitize text, re-split it into sentence units, synthesize each unit
/// in order, and concatenate the results along the time axis.
///
/// A unit that fails to synthesize is logged and skipped — never fatal.
/// Cancellation between units abandons the remainder and returns `None`.
pub fn synthesize_text(
    synth: &dyn SpeechSynthesizer,
    opts: &SynthesisOptions,
    min_unit_length: usize,
    cancel: &CancelToken,
    text: &str,
) -> Option<Waveform> {
    let clean = sanitize_text(text);
    if clean.is_empty() {
        tracing::debug!(preview = %preview_of(text), "Chunk sanitized to nothing, dropping");
        return None;
    }

    let mut parts: Vec<Waveform> = Vec::new();
    for unit in sentence_units(&clean, min_unit_length) {
        if cancel.is_cancelled() {
            return None;
        }
        match synth.synthesize(&unit, opts) {
            Ok(waveform) if !waveform.is_empty() => parts.push(waveform),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    unit = %preview_of(&unit),
                    error = %e,
                    "Unit synthesis failed, skipping"
                );
            }
        }
    }

    Waveform::concat(parts)
}

/// Push an artifact, blocking under backpressure while staying
/// responsive to cancellation. Returns `false` when the artifact was
/// discarded instead of pushed (cancelled or channel gone).
fn push_artifact(
    audio_tx: &Sender<AudioItem>,
    artifact: Artifact,
    store: &ArtifactStore,
    poll: Duration,
    cancel: &CancelToken,
) -> bool {
    let mut item = artifact;
    loop {
        if cancel.is_cancelled() {
            store.discard(&item);
            return false;
        }
        match audio_tx.send_timeout(AudioItem::Artifact(item), poll) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(AudioItem::Artifact(a))) => item = a,
            Err(SendTimeoutError::Disconnected(AudioItem::Artifact(a))) => {
                store.discard(&a);
                return false;
            }
            // Only artifacts are ever pushed through here.
            Err(SendTimeoutError::Timeout(AudioItem::Done))
            | Err(SendTimeoutError::Disconnected(AudioItem::Done)) => return false,
        }
    }
}

/// Render a whole utterance to a WAV file, bypassing the pipeline.
///
/// For offline rendering where playback order and latency do not
/// matter; no queues or threads are involved.
pub fn render_to_wav(
    synth: &dyn SpeechSynthesizer,
    opts: &SynthesisOptions,
    min_unit_length: usize,
    text: &str,
    path: &std::path::Path,
) -> Result<(), PipelineError> {
    let cancel = CancelToken::new();
    let waveform = synthesize_text(synth, opts, min_unit_length, &cancel, text)
        .ok_or(PipelineError::NoAudio)?;
    crate::artifact::write_wav(path, &waveform)
}

// ── Playback (consumer) ────────────────────────────────────────────

/// Playback stage body.
///
/// FIFO consumption of the audio queue already guarantees playback order
/// equals segment order; no reordering buffer exists. Each artifact is
/// deleted after its single consumption, whether playback succeeded,
/// failed, or was skipped by cancellation.
pub(crate) fn run_consumer(
    audio_rx: &Receiver<AudioItem>,
    sink: &dyn AudioSink,
    store: &ArtifactStore,
    cancel: &CancelToken,
    poll: Duration,
) {
    loop {
        match audio_rx.recv() {
            Ok(AudioItem::Artifact(artifact)) => {
                if cancel.is_cancelled() {
                    // A newer request superseded this instance: never play
                    // stale audio, just reclaim storage down to the marker.
                    store.discard(&artifact);
                    drain_to_done(audio_rx, store, poll);
                    break;
                }

                tracing::info!(seq = artifact.seq, preview = %artifact.preview, "Playing chunk");
                if let Err(e) = sink.play(&artifact.path) {
                    tracing::warn!(seq = artifact.seq, error = %e, "Playback failed, continuing");
                }
                if let Err(e) = store.remove(&artifact) {
                    tracing::warn!(seq = artifact.seq, error = %e, "Failed to delete played artifact");
                }
            }
            Ok(AudioItem::Done) | Err(_) => break,
        }
    }
    tracing::debug!("Playback stage finished");
}

/// Discard queued artifacts until the terminal marker arrives.
///
/// The producer's epilogue guarantees the marker; the timeout only keeps
/// this loop responsive while waiting for it.
fn drain_to_done(audio_rx: &Receiver<AudioItem>, store: &ArtifactStore, poll: Duration) {
    loop {
        match audio_rx.recv_timeout(poll) {
            Ok(AudioItem::Artifact(artifact)) => store.discard(&artifact),
            Ok(AudioItem::Done) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

/// Empty both queues of not-yet-consumed items on behalf of `stop()`.
///
/// Artifacts are deleted as they are drained. If the terminal marker was
/// swept up in the drain it is pushed back, so a consumer that is still
/// running can never be left waiting for a marker that no longer exists.
pub(crate) fn drain_queues(
    text_rx: &Receiver<String>,
    audio_rx: &Receiver<AudioItem>,
    audio_tx: &Sender<AudioItem>,
    store: &ArtifactStore,
) {
    while text_rx.try_recv().is_ok() {}

    let mut saw_done = false;
    while let Ok(item) = audio_rx.try_recv() {
        match item {
            AudioItem::Artifact(artifact) => store.discard(&artifact),
            AudioItem::Done => saw_done = true,
        }
    }
    if saw_done {
        let _ = audio_tx.try_send(AudioItem::Done);
    }
}

// ── Latency-masking filler ─────────────────────────────────────────

/// Play the configured filler clip once, on its own thread.
///
/// Checks the token a single time before playing; has no sequencing
/// relationship to synthesized chunks and is never joined.
pub(crate) fn spawn_filler(
    sink: Arc<dyn AudioSink>,
    filler_wav: Option<PathBuf>,
    cancel: CancelToken,
) {
    let Some(path) = filler_wav else {
        return;
    };

    let spawned = std::thread::Builder::new()
        .name("vocstream-filler".into())
        .spawn(move || {
            if cancel.is_cancelled() {
                return;
            }
            if !path.exists() {
                tracing::warn!(path = %path.display(), "Filler clip missing, skipping");
                return;
            }
            tracing::debug!(path = %path.display(), "Playing filler");
            if let Err(e) = sink.play(&path) {
                tracing::warn!(error = %e, "Filler playback failed");
            }
        });

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to spawn filler thread");
    }
}
