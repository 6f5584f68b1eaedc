//! Queueing speech controller.
//!
//! [`enqueue`](SpeakQueue::enqueue) appends text onto one
//! continuously-running pipeline instance, lazily starting the stage
//! pair on first use. When the text queue stays empty for a poll
//! interval the producer winds the instance down naturally; the next
//! enqueue joins the wound-down stages and respawns a fresh pair over
//! the same scratch directory.
//!
//! The producer's exit decision and `enqueue`'s hand-off both go through
//! the controller state lock, so text can never be committed to a
//! producer that has already decided to exit. Respawns additionally
//! serialize on a dedicated mutex and join the previous stages first —
//! sequence numbering restarts at 1 only once no prior thread can still
//! be holding a `chunk_<seq>.wav`.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use vocstream_core::{AudioSink, PipelineConfig, SpeechSynthesizer};

use crate::artifact::ArtifactStore;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::stages::{self, AudioItem, Feed};

/// One running stage pair with its queues and token.
struct QueueInstance {
    /// Distinguishes this instance from its successors, so a stale
    /// producer can never flip flags on a replacement.
    id: u64,
    cancel: CancelToken,
    text_tx: Sender<String>,
    text_rx: Receiver<String>,
    audio_tx: Sender<AudioItem>,
    audio_rx: Receiver<AudioItem>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
    /// Set by the producer, under the state lock, as it winds down.
    producer_exiting: bool,
    /// Set by `stop()`; the instance must be joined and replaced.
    stopped: bool,
}

impl QueueInstance {
    fn is_running(&self) -> bool {
        !self.producer.is_finished() || !self.consumer.is_finished()
    }

    /// Whether the producer can still be handed text.
    fn accepts_text(&self) -> bool {
        !self.stopped && !self.producer_exiting && !self.producer.is_finished()
    }
}

#[derive(Default)]
struct QueueState {
    instance: Option<QueueInstance>,
    next_id: u64,
}

/// How one `enqueue` attempt left off.
enum Handoff {
    /// The text is in the queue.
    Delivered,

    /// The queue was full; block outside the lock.
    Blocked {
        text_tx: Sender<String>,
        cancel: CancelToken,
        id: u64,
    },

    /// No live producer; join the old stages and spawn fresh ones.
    NeedRespawn,
}

/// Queueing controller: `enqueue` appends, the instance winds down when
/// drained.
pub struct SpeakQueue {
    synth: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    store: Arc<ArtifactStore>,
    config: PipelineConfig,
    state: Arc<Mutex<QueueState>>,
    /// Serializes join-and-respawn so two concurrent `enqueue` calls can
    /// never start duplicate stage pairs.
    respawn_lock: Mutex<()>,
}

impl SpeakQueue {
    /// Create a controller; opens the scratch directory. No threads run
    /// until the first `enqueue`.
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
            state: Arc::new(Mutex::new(QueueState::default())),
            respawn_lock: Mutex::new(()),
        })
    }

    /// Append text to the running session, starting stages if needed.
    ///
    /// Blocks while the bounded text queue is full (backpressure from
    /// synthesis). If `stop()` arrives while this call is waiting, the
    /// text is dropped along with everything else in flight.
    pub fn enqueue(&self, text: &str) -> Result<(), PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let poll = self.config.poll_interval();
        let mut pending = text.to_string();

        loop {
            let handoff = {
                let st = self.state.lock().expect("queue state lock poisoned");
                match st.instance.as_ref() {
                    Some(inst) if inst.accepts_text() => {
                        // Hand off under the lock: the producer's exit
                        // decision takes this same lock, so a delivered
                        // chunk is guaranteed to be seen.
                        match inst.text_tx.try_send(std::mem::take(&mut pending)) {
                            Ok(()) => Handoff::Delivered,
                            Err(TrySendError::Full(v)) => {
                                pending = v;
                                Handoff::Blocked {
                                    text_tx: inst.text_tx.clone(),
                                    cancel: inst.cancel.clone(),
                                    id: inst.id,
                                }
                            }
                            Err(TrySendError::Disconnected(v)) => {
                                pending = v;
                                Handoff::NeedRespawn
                            }
                        }
                    }
                    _ => Handoff::NeedRespawn,
                }
            };

            match handoff {
                Handoff::Delivered => return Ok(()),
                Handoff::Blocked { text_tx, cancel, id } => {
                    // A full queue means the producer is alive and busy —
                    // it cannot decide to exit while items remain. Block
                    // outside the lock, staying responsive to stop().
                    loop {
                        if cancel.is_cancelled() {
                            return Ok(());
                        }
                        match text_tx.send_timeout(std::mem::take(&mut pending), poll) {
                            Ok(()) => return Ok(()),
                            Err(crossbeam_channel::SendTimeoutError::Timeout(v)) => {
                                pending = v;
                                if !self.instance_accepts(id) {
                                    break; // re-enter the outer loop
                                }
                            }
                            Err(crossbeam_channel::SendTimeoutError::Disconnected(v)) => {
                                pending = v;
                                break;
                            }
                        }
                    }
                }
                Handoff::NeedRespawn => self.respawn()?,
            }
        }
    }

    /// Cancel the running session and empty both queues.
    ///
    /// The stage threads exit on their own within one unit of work; the
    /// next `enqueue` joins them before starting a fresh instance.
    pub fn stop(&self) {
        let mut st = self.state.lock().expect("queue state lock poisoned");
        if let Some(inst) = st.instance.as_mut() {
            tracing::info!("Stop requested");
            inst.cancel.cancel();
            inst.stopped = true;
            stages::drain_queues(&inst.text_rx, &inst.audio_rx, &inst.audio_tx, &self.store);
        }
    }

    /// Whether any stage thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let st = self.state.lock().expect("queue state lock poisoned");
        st.instance.as_ref().is_some_and(QueueInstance::is_running)
    }

    /// Whether both queues are empty and no stage thread is alive.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let st = self.state.lock().expect("queue state lock poisoned");
        match st.instance {
            None => true,
            Some(ref inst) => {
                inst.text_rx.is_empty() && inst.audio_rx.is_empty() && !inst.is_running()
            }
        }
    }

    /// Block until the session has fully drained.
    pub fn wait_until_idle(&self) {
        let poll = self.config.poll_interval();
        while !self.is_idle() {
            std::thread::sleep(poll);
        }
    }

    // ── Internal ───────────────────────────────────────────────────

    fn instance_accepts(&self, id: u64) -> bool {
        let st = self.state.lock().expect("queue state lock poisoned");
        st.instance
            .as_ref()
            .is_some_and(|inst| inst.id == id && inst.accepts_text())
    }

    /// Join any defunct instance, then install a fresh one.
    fn respawn(&self) -> Result<(), PipelineError> {
        let _guard = self.respawn_lock.lock().expect("respawn lock poisoned");

        // Another enqueue may have respawned while we waited.
        let old = {
            let mut st = self.state.lock().expect("queue state lock poisoned");
            if st.instance.as_ref().is_some_and(QueueInstance::accepts_text) {
                return Ok(());
            }
            st.instance.take()
        };

        // Join outside the state lock: the winding-down producer takes
        // that lock for its exit decision.
        if let Some(old) = old {
            join_instance(old);
        }

        let mut st = self.state.lock().expect("queue state lock poisoned");
        let id = st.next_id;
        st.next_id += 1;
        st.instance = Some(self.start_instance(id)?);
        tracing::debug!(instance = id, "Speech stages started");
        Ok(())
    }

    /// Spawn a fresh stage pair plus the filler.
    fn start_instance(&self, id: u64) -> Result<QueueInstance, PipelineError> {
        let cancel = CancelToken::new();
        let (text_tx, text_rx) = bounded::<String>(self.config.text_queue_capacity);
        let (audio_tx, audio_rx) = bounded::<AudioItem>(self.config.audio_queue_capacity);
        let poll = self.config.poll_interval();

        let producer = {
            let text_rx = text_rx.clone();
            let audio_tx = audio_tx.clone();
            let synth = Arc::clone(&self.synth);
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            let cancel = cancel.clone();
            let state = Arc::clone(&self.state);
            std::thread::Builder::new()
                .name("vocstream-synth".into())
                .spawn(move || {
                    let next_text = || match text_rx.recv_timeout(poll) {
                        Ok(text) => Feed::Text(text),
                        Err(RecvTimeoutError::Disconnected) => Feed::End,
                        Err(RecvTimeoutError::Timeout) => {
                            // Wind-down decision, under the controller
                            // lock so it cannot race a hand-off.
                            let mut st = state.lock().expect("queue state lock poisoned");
                            match st.instance.as_mut() {
                                Some(inst) if inst.id == id => {
                                    if text_rx.is_empty() {
                                        inst.producer_exiting = true;
                                        Feed::End
                                    } else {
                                        Feed::Retry
                                    }
                                }
                                // Replaced or stopped underneath us.
                                _ => Feed::End,
                            }
                        }
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

        Ok(QueueInstance {
            id,
            cancel,
            text_tx,
            text_rx,
            audio_tx,
            audio_rx,
            producer,
            consumer,
            producer_exiting: false,
            stopped: false,
        })
    }
}

/// Join a defunct instance's stage threads.
fn join_instance(instance: QueueInstance) {
    for (name, handle) in [
        ("producer", instance.producer),
        ("consumer", instance.consumer),
    ] {
        if handle.join().is_err() {
            tracing::error!(stage = name, "Stage thread panicked");
        }
    }
}
