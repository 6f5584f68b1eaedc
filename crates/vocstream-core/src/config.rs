//! Pipeline and segmentation configuration.
//!
//! Pure domain types with documented defaults; adapters (CLI flags,
//! server bootstrap) construct and override these explicitly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::synth::SynthesisOptions;

/// Default capacity of the text queue (segmentation → synthesis).
pub const DEFAULT_TEXT_QUEUE_CAPACITY: usize = 20;

/// Default capacity of the audio queue (synthesis → playback).
///
/// Deliberately small: with a slow sink, synthesis blocks after a few
/// chunks instead of rendering an unbounded backlog of audio.
pub const DEFAULT_AUDIO_QUEUE_CAPACITY: usize = 3;

/// Default stage polling interval in milliseconds.
///
/// Used by blocked queue operations so stages can re-check cancellation;
/// not a user-facing deadline of any kind.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Whole-string chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Minimum chunk length in characters before the merge buffer flushes.
    pub min_length: usize,

    /// Emit the very first chunk at the first sentence terminator
    /// regardless of length, to minimise time-to-first-audio.
    pub first_chunk_fast_path: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_length: 40,
            first_chunk_fast_path: true,
        }
    }
}

/// Streaming (live token source) chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSegmenterConfig {
    /// Minimum chunk length in characters for chunks after the first.
    pub min_len: usize,

    /// Force-emit threshold: a buffer this long is flushed even without
    /// a sentence terminator, bounding worst-case latency and memory.
    pub soft_max_len: usize,
}

impl Default for StreamSegmenterConfig {
    fn default() -> Self {
        Self {
            min_len: 20,
            soft_max_len: 80,
        }
    }
}

/// Configuration for one speech pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the bounded text queue.
    pub text_queue_capacity: usize,

    /// Capacity of the bounded audio queue.
    pub audio_queue_capacity: usize,

    /// Stage polling interval in milliseconds (cancellation responsiveness).
    pub poll_interval_ms: u64,

    /// Scratch directory for WAV artifacts. `None` means a private
    /// temporary directory that is removed when the service drops.
    pub scratch_dir: Option<PathBuf>,

    /// Pre-rendered filler clip played at pipeline start to mask
    /// synthesis latency. `None` disables the filler.
    pub filler_wav: Option<PathBuf>,

    /// Minimum length for merged internal sentence units inside the
    /// synthesis stage (finer-grained than the outer segmentation).
    pub min_unit_length: usize,

    /// Whole-string chunking policy.
    pub segmenter: SegmenterConfig,

    /// Voice parameters forwarded to every synthesis call.
    pub synthesis: SynthesisOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_queue_capacity: DEFAULT_TEXT_QUEUE_CAPACITY,
            audio_queue_capacity: DEFAULT_AUDIO_QUEUE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            scratch_dir: None,
            filler_wav: None,
            min_unit_length: 50,
            segmenter: SegmenterConfig::default(),
            synthesis: SynthesisOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// The polling interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.text_queue_capacity, DEFAULT_TEXT_QUEUE_CAPACITY);
        assert_eq!(cfg.audio_queue_capacity, DEFAULT_AUDIO_QUEUE_CAPACITY);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(200));
        assert!(cfg.scratch_dir.is_none());
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"audio_queue_capacity": 5}"#).unwrap();
        assert_eq!(cfg.audio_queue_capacity, 5);
        assert_eq!(cfg.text_queue_capacity, DEFAULT_TEXT_QUEUE_CAPACITY);
    }
}
