//! The speech-synthesizer port.
//!
//! The neural model itself is an external collaborator: the pipeline only
//! sees this trait. Implementations load their model/voice style once at
//! construction, not per call, and are expected to be deterministic for
//! identical inputs.

use crate::audio::Waveform;

/// Errors a synthesizer backend can produce.
///
/// A failure for one unit of text is never fatal to the pipeline — the
/// synthesis stage logs it and continues with the next unit.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// The backend could not be reached or returned a transport error.
    #[error("Synthesis request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("Synthesis server rejected request: {0}")]
    Rejected(String),

    /// The returned audio payload could not be decoded.
    #[error("Failed to decode synthesized audio: {0}")]
    Decode(String),
}

/// Voice parameters passed to every synthesis call.
///
/// These mirror what the synthesis server accepts; the pipeline treats
/// them as opaque and only threads them through.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SynthesisOptions {
    /// Language code (e.g. `"ko"`, `"en"`).
    pub language: String,

    /// Voice style identifier, resolved by the backend.
    pub voice_style: String,

    /// Number of diffusion steps. Lower is faster, higher is cleaner.
    pub diffusion_steps: u32,

    /// Speaking-speed multiplier.
    pub speed: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            language: "ko".to_string(),
            voice_style: "M1".to_string(),
            diffusion_steps: 5,
            speed: 1.2,
        }
    }
}

/// Backend-agnostic speech synthesizer.
///
/// Implementations must be `Send + Sync`: the synthesis stage runs on a
/// worker thread and the same instance may be shared by consecutive
/// pipeline instances. The call is synchronous by design — it executes on
/// a dedicated OS thread, never on an async executor.
pub trait SpeechSynthesizer: Send + Sync {
    /// Render one unit of text to audio.
    ///
    /// `text` is a single sentence or short merged run of sentences; the
    /// pipeline handles all chunking before calling this.
    fn synthesize(&self, text: &str, opts: &SynthesisOptions) -> Result<Waveform, SynthError>;
}
