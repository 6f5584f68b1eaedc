//! Streaming TTS pipeline: text in, ordered speech out, with bounded
//! buffering and cooperative cancellation.
//!
//! ```text
//!   token source ─▶ segmentation ─▶ [text queue] ─▶ synthesis ─▶ [audio queue] ─▶ playback
//!                                                       │                            │
//!                                                  synthesizer                  audio sink
//! ```
//!
//! Two controllers supervise the stage pair:
//! - [`SpeechService`] — single-shot: every `speak` cancels and replaces
//!   the running utterance.
//! - [`SpeakQueue`] — queueing: `enqueue` appends onto one
//!   continuously-running session that winds down when drained.
//!
//! Both queues are bounded, so a slow sink throttles synthesis instead of
//! letting rendered audio pile up. Cancellation is a shared flag polled at
//! stage checkpoints — an in-flight synthesis or playback call runs to
//! completion; the flag only prevents the next unit of work.

pub mod artifact;
pub mod backend;
pub mod cancel;
pub mod error;
pub mod playback;
pub mod queue_service;
pub mod segment;
pub mod speech;
pub mod stages;
pub mod stream_segment;
pub mod token_source;

// Re-export key types for convenience
pub use artifact::{Artifact, ArtifactStore};
pub use cancel::CancelToken;
pub use error::PipelineError;
pub use playback::RodioSink;
pub use queue_service::SpeakQueue;
pub use speech::SpeechService;
pub use stream_segment::StreamSegmenter;
pub use token_source::TokenSourceConfig;
