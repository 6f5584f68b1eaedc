//! Audio sample containers shared across the pipeline.

use std::time::Duration;

/// A rendered waveform: PCM f32 samples plus their sample rate.
///
/// Produced by a [`SpeechSynthesizer`](crate::synth::SpeechSynthesizer),
/// concatenated per segment by the synthesis stage, and persisted to a
/// WAV artifact before playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Mono PCM f32 samples.
    pub samples: Vec<f32>,

    /// Sample rate of the audio in Hz (e.g. 44 100).
    pub sample_rate: u32,
}

impl Waveform {
    /// Create a waveform from samples and a sample rate.
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Whether the waveform contains no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the audio.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Append another waveform along the time axis.
    ///
    /// The other waveform's samples are taken verbatim; the caller is
    /// responsible for only concatenating audio of the same rate (all
    /// units within one segment come from the same synthesizer, so the
    /// rates match by construction).
    pub fn append(&mut self, other: &Self) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Concatenate a sequence of waveforms along the time axis.
    ///
    /// Returns `None` when `parts` is empty.
    #[must_use]
    pub fn concat<I>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut iter = parts.into_iter();
        let mut merged = iter.next()?;
        for part in iter {
            merged.append(&part);
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_sample_count() {
        let wav = Waveform::new(vec![0.0; 22_050], 44_100);
        assert_eq!(wav.duration(), Duration::from_millis(500));
    }

    #[test]
    fn concat_joins_along_time_axis() {
        let a = Waveform::new(vec![0.1, 0.2], 24_000);
        let b = Waveform::new(vec![0.3], 24_000);
        let merged = Waveform::concat([a, b]).unwrap();
        assert_eq!(merged.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(merged.sample_rate, 24_000);
    }

    #[test]
    fn concat_of_nothing_is_none() {
        assert!(Waveform::concat(std::iter::empty()).is_none());
    }
}
