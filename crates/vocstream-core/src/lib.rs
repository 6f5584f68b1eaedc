//! Core domain types and port definitions for vocstream.
//!
//! This crate holds everything the pipeline and its adapters agree on:
//! the [`Waveform`] sample container, the [`SpeechSynthesizer`] and
//! [`AudioSink`] ports, and the configuration structs with their
//! documented defaults. It has no I/O of its own — concrete synthesizers
//! and sinks live in `vocstream-voice`, and are injected into the
//! controllers at construction (never looked up through globals).

pub mod audio;
pub mod config;
pub mod sink;
pub mod synth;

// Re-export key types for convenience
pub use audio::Waveform;
pub use config::{PipelineConfig, SegmenterConfig, StreamSegmenterConfig};
pub use sink::{AudioSink, SinkError};
pub use synth::{SpeechSynthesizer, SynthError, SynthesisOptions};
