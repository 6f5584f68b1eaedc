//! Single-shot speech controller.
//!
//! Every [`speak`](SpeechService::speak) call is a fresh utterance: any
//! active pipeline instance is cancelled, its stage threads are joined,
//! and a brand-new instance (fresh queues, fresh token, sequence
//! numbering from 1) takes its place. The join is what makes reusing
//! sequence-numbered artifact filenames safe — a prior consumer can
//! still be holding `chunk_1.wav` until it exits.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use vocstream_core::{AudioSink, PipelineConfig, SpeechSynthesizer};

use crate::artifact::ArtifactStore;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::segment::split_text;
use crate::stages::{self, AudioItem, Feed};

/// One active utterance: queues, token, and stage threads.
struct Utterance {
    cancel: CancelToken,
    text_rx: Receiver<String>,
    audio_tx: Sender<AudioItem>,
    audio_rx: Receiver<AudioItem>,
    threads: Vec<JoinHandle<()>>,
}

impl Utterance {
    fn is_running(&self) -> bool {
        self.threads.iter().any(|t| !t.is_finished())
    }
}

/// Single-shot controller: `speak` cancels-and-replaces.
///
/// Constructed once with its collaborators injected; shared across
/// request handlers behind an `Arc`.
pub struct SpeechService {
    synth: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    store: Arc<ArtifactStore>,
    config: PipelineConfig,
    /// The single serialization point for start/replace decisions.
    current: Mutex<Option<Utterance>>,
}

impl SpeechService {
    /// Create a service; opens the scratch directory.
    pub fn new(
        synth: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let store = Arc::new(ArtifactStore::new(config.scratch_dir.as_deref())?);
        Ok(Self {
            synth,
            sink,
            store,
            config,
            current: Mutex::new(None),
        })
    }

    /// Speak `text` as a fresh utterance, replacing any active one.
    ///
    /// Returns as soon as the new instance's stages are running; audio
    /// plays in the background. Blocks briefly while the previous
    /// instance finishes its in-flight unit of work and exits.
    pub fn speak(&self, text: &str) -> Result<(), PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let mut current = self.current.lock().expect("speech lock poisoned");

        if let Some(old) = current.take() {
            tracing::info!("Superseding active utterance");
            self.teardown(old);
        }

        *current = Some(self.start_utterance(text)?);
        Ok(())
    }

    /// Request cancellation of the current utterance and empty both
    /// queues. Stage threads exit on their own within one unit of work.
    pub fn stop(&self) {
        let current = self.current.lock().expect("speech lock poisoned");
        if let Some(ref utterance) = *current {
            tracing::info!("Stop requested");
            utterance.cancel.cancel();
            stages::drain_queues(
                &utterance.text_rx,
                &utterance.audio_rx,
                &utterance.audio_tx,
                &self.store,
            );
        }
    }

    /// Whether any stage thread of the current utterance is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let current = self.current.lock().expect("speech lock poisoned");
        current.as_ref().is_some_and(Utterance::is_running)
    }

    /// Whether both queues are empty and no stage thread is alive.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let current = self.current.lock().expect("speech lock poisoned");
        match *current {
            None => true,
            Some(ref u) => u.text_rx.is_empty() && u.audio_rx.is_empty() && !u.is_running(),
        }
    }

    /// Block until the current utterance has fully drained.
    ///
    /// Intended for batch callers (CLI); HTTP callers poll
    /// [`is_idle`](Self::is_idle) instead.
    pub fn wait_until_idle(&self) {
        let poll = self.config.poll_interval();
        while !self.is_idle() {
            std::thread::sleep(poll);
        }
    }

    // ── Internal ───────────────────────────────────────────────────

    /// Cancel an utterance and join all of its stage threads.
    fn teardown(&self, utterance: Utterance) {
        utterance.cancel.cancel();
        stages::drain_queues(
            &utterance.text_rx,
            &utterance.audio_rx,
            &utterance.audio_tx,
            &self.store,
        );
        for thread in utterance.threads {
            if thread.join().is_err() {
                tracing::error!("A stage thread of the superseded utterance panicked");
            }
        }
    }

    /// Build and start a fresh pipeline instance for `text`.
    fn start_utterance(&self, text: &str) -> Result<Utterance, PipelineError> {
        let cancel = CancelToken::new();
        let (text_tx, text_rx) = bounded::<String>(self.config.text_queue_capacity);
        let (audio_tx, audio_rx) = bounded::<AudioItem>(self.config.audio_queue_capacity);
        let poll = self.config.poll_interval();

        let chunks = split_text(text, &self.config.segmenter);
        tracing::info!(chars = text.chars().count(), chunks = chunks.len(), "Starting utterance");

        // Feeder: pushes chunks through the bounded text queue, then
        // closes it by dropping the only sender.
        let feeder = {
            let cancel = cancel.clone();
            std::thread::Builder::new()
                .name("vocstream-feed".into())
                .spawn(move || feed_chunks(chunks, &text_tx, &cancel, poll))?
        };

        let producer = {
            let text_rx = text_rx.clone();
            let audio_tx = audio_tx.clone();
            let synth = Arc::clone(&self.synth);
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            let cancel = cancel.clone();
            std::thread::Builder::new()
                .name("vocstream-synth".into())
                .spawn(move || {
                    let next_text = || match text_rx.recv_timeout(poll) {
                        Ok(text) => Feed::Text(text),
                        Err(RecvTimeoutError::Timeout) => Feed::Retry,
                        Err(RecvTimeoutError::Disconnected) => Feed::End,
                    };
                    stages::run_producer(
                        next_text,
                        &audio_tx,
                        synth.as_ref(),
                        &store,
                        &config,
                        &cancel,
                    );
                })?
        };

        let consumer = {
            let audio_rx = audio_rx.clone();
            let sink = Arc::clone(&self.sink);
            let store = Arc::clone(&self.store);
            let cancel = cancel.clone();
            std::thread::Builder::new()
                .name("vocstream-play".into())
                .spawn(move || {
                    stages::run_consumer(&audio_rx, sink.as_ref(), &store, &cancel, poll);
                })?
        };

        stages::spawn_filler(
            Arc::clone(&self.sink),
            self.config.filler_wav.clone(),
            cancel.clone(),
        );

        Ok(Utterance {
            cancel,
            text_rx,
            audio_tx,
            audio_rx,
            threads: vec![feeder, producer, consumer],
        })
    }
}

/// Feed whole-string chunks into the text queue, honouring cancellation
/// while blocked on a full queue.
fn feed_chunks(
    chunks: Vec<String>,
    text_tx: &Sender<String>,
    cancel: &CancelToken,
    poll: Duration,
) {
    for chunk in chunks {
        let mut item = chunk;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match text_tx.send_timeout(item, poll) {
                Ok(()) => break,
                Err(crossbeam_channel::SendTimeoutError::Timeout(v)) => item = v,
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
    // Sender drops here: the producer sees the queue close after the
    // remaining chunks drain.
}
