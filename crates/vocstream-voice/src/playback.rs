//! Host audio output via `rodio`, confined to a dedicated thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so the output
//! device lives on one OS thread for its entire lifetime and the public
//! [`RodioSink`] handle proxies every play request through a channel.
//! This keeps the sink `Send + Sync` without any `unsafe` impls and lets
//! the playback stage and the filler thread share one device.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use rodio::{Decoder, OutputStream, Sink};
use vocstream_core::{AudioSink, SinkError};

/// A command sent from a caller to the audio thread.
enum SinkCommand {
    /// Play a file; reply when playback has drained (or failed).
    Play {
        path: PathBuf,
        reply: mpsc::Sender<Result<(), SinkError>>,
    },

    /// Shut down the audio thread, releasing the device.
    Shutdown,
}

/// `Send + Sync` handle to the dedicated audio output thread.
///
/// `play` blocks its caller until the clip has fully drained, but
/// concurrent callers do not serialize against each other: each request
/// gets its own `rodio::Sink` on the shared device, and the actor hands
/// the drain-wait off to a short-lived thread. That is what lets the
/// filler clip overlap pipeline startup.
pub struct RodioSink {
    cmd_tx: mpsc::Sender<SinkCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioSink {
    /// Spawn the audio thread and open the default output device on it.
    pub fn new() -> Result<Self, SinkError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<SinkCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), SinkError>>();

        let thread = thread::Builder::new()
            .name("vocstream-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| SinkError::Output(format!("failed to spawn audio thread: {e}")))?;

        // Wait for the audio thread to finish device initialisation.
        init_rx
            .recv()
            .map_err(|_| SinkError::PlaybackThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// The body of the audio thread. Owns the `!Send` output stream.
    fn run(cmd_rx: &mpsc::Receiver<SinkCommand>, init_tx: &mpsc::Sender<Result<(), SinkError>>) {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(SinkError::Output(e.to_string())));
                return;
            }
        };
        // Must stay alive for the device to keep playing.
        let _stream = stream;

        if init_tx.send(Ok(())).is_err() {
            return;
        }
        tracing::info!("Audio output initialized on default device");

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                SinkCommand::Play { path, reply } => {
                    match start_playback(&stream_handle, &path) {
                        Ok(sink) => {
                            // Sink is Send in rodio 0.20+: move the drain
                            // wait off the actor so other requests (the
                            // filler) are not blocked behind this one.
                            thread::spawn(move || {
                                sink.sleep_until_end();
                                let _ = reply.send(Ok(()));
                            });
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                SinkCommand::Shutdown => break,
            }
        }

        tracing::debug!("Audio thread shutting down");
    }
}

/// Open, decode, and start playing a file on a fresh sink.
fn start_playback(
    stream_handle: &rodio::OutputStreamHandle,
    path: &Path,
) -> Result<Sink, SinkError> {
    let sink = Sink::try_new(stream_handle).map_err(|e| SinkError::Output(e.to_string()))?;
    let file = BufReader::new(File::open(path)?);
    let source = Decoder::new(file).map_err(|e| SinkError::Decode(e.to_string()))?;
    sink.append(source);
    Ok(sink)
}

impl AudioSink for RodioSink {
    fn play(&self, path: &Path) -> Result<(), SinkError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(SinkCommand::Play {
                path: path.to_path_buf(),
                reply: reply_tx,
            })
            .map_err(|_| SinkError::PlaybackThreadDied)?;
        reply_rx.recv().map_err(|_| SinkError::PlaybackThreadDied)?
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        // Best-effort shutdown — the thread may already be dead.
        let _ = self.cmd_tx.send(SinkCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
