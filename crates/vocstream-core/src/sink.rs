//! The audio-sink port.

use std::path::Path;

/// Errors the playback host can produce.
///
/// Sink failures are non-fatal to the pipeline: the playback stage logs
/// them, still reclaims the artifact, and moves on to the next one.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// No output device, or the device could not be opened.
    #[error("Failed to open audio output: {0}")]
    Output(String),

    /// The artifact file could not be opened.
    #[error("Failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact file could not be decoded as audio.
    #[error("Failed to decode audio file: {0}")]
    Decode(String),

    /// The playback thread is no longer running.
    #[error("Audio playback thread died")]
    PlaybackThreadDied,
}

/// Backend-agnostic audio output.
///
/// `play` blocks the calling thread until the file has finished playing
/// (or playback failed). Only the playback stage calls it in sequence;
/// the latency-masking filler uses the same sink from its own thread, so
/// implementations must tolerate concurrent calls.
pub trait AudioSink: Send + Sync {
    /// Play a WAV file synchronously.
    fn play(&self, path: &Path) -> Result<(), SinkError>;
}
