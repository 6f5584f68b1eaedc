//! Pipeline error types.

use std::path::PathBuf;

use vocstream_core::{SinkError, SynthError};

/// Errors that can occur in the speech pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A synthesis backend call failed.
    #[error("Speech synthesis failed: {0}")]
    Synth(#[from] SynthError),

    /// The audio sink failed to play an artifact.
    #[error("Audio playback failed: {0}")]
    Sink(#[from] SinkError),

    /// IO error (scratch directory, artifact files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encode/decode error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// An artifact file was missing when the pipeline went to delete it.
    #[error("Artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    /// The token source request or stream failed.
    #[error("Token source error: {0}")]
    TokenSource(#[from] reqwest::Error),

    /// The text sanitized to nothing, or every unit failed to render.
    #[error("Text produced no audio")]
    NoAudio,
}
