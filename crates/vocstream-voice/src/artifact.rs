//! Temporary WAV artifact storage.
//!
//! Every synthesized segment is persisted to the scratch directory as
//! `chunk_<seq>.wav`, consumed exactly once by the playback stage, and
//! deleted immediately afterwards — on the happy path, on sink failure,
//! and on cancellation-driven drains alike. Nothing may outlive its
//! single consumption.
//!
//! Sequence-numbered names are only collision-safe because controllers
//! join a prior instance's stages before reusing numbering; see
//! [`SpeechService`](crate::speech::SpeechService).

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vocstream_core::Waveform;

use crate::error::PipelineError;

/// A rendered waveform persisted to scratch storage.
///
/// Identified by its segment's sequence number; the preview is carried
/// along purely for log lines.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Sequence index inherited from the source segment.
    pub seq: u64,

    /// Location of the WAV file.
    pub path: PathBuf,

    /// Short single-line preview of the source text.
    pub preview: String,
}

/// Scratch directory owning the artifact files of a service.
///
/// With no configured directory a private temp dir is created and
/// removed when the store drops.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    _owned: Option<TempDir>,
}

impl ArtifactStore {
    /// Open (and create if needed) the scratch directory.
    pub fn new(scratch_dir: Option<&Path>) -> Result<Self, PipelineError> {
        match scratch_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Self {
                    dir: dir.to_path_buf(),
                    _owned: None,
                })
            }
            None => {
                let owned = tempfile::Builder::new().prefix("vocstream-audio-").tempdir()?;
                Ok(Self {
                    dir: owned.path().to_path_buf(),
                    _owned: Some(owned),
                })
            }
        }
    }

    /// The scratch directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a waveform as `chunk_<seq>.wav`.
    pub fn persist(
        &self,
        seq: u64,
        waveform: &Waveform,
        preview: String,
    ) -> Result<Artifact, PipelineError> {
        let path = self.dir.join(format!("chunk_{seq}.wav"));
        write_wav(&path, waveform)?;
        Ok(Artifact { seq, path, preview })
    }

    /// Delete an artifact's backing file.
    ///
    /// A missing file is reported as [`PipelineError::ArtifactMissing`]
    /// rather than silently ignored, so double-consumption bugs surface
    /// in logs instead of disappearing.
    pub fn remove(&self, artifact: &Artifact) -> Result<(), PipelineError> {
        match fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::ArtifactMissing(artifact.path.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an artifact, logging instead of propagating failure.
    ///
    /// Used on drain paths where the pipeline must keep going no matter
    /// what happened to the file.
    pub fn discard(&self, artifact: &Artifact) {
        if let Err(e) = self.remove(artifact) {
            tracing::warn!(seq = artifact.seq, error = %e, "Failed to delete artifact");
        }
    }
}

// ── WAV encode/decode ──────────────────────────────────────────────

/// Write a mono float32 WAV file.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<(), PipelineError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in &waveform.samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Decode WAV data (float or integer PCM) into a mono f32 waveform.
///
/// Multi-channel input is averaged down to mono.
pub fn decode_wav<R: Read + Seek>(reader: R) -> Result<Waveform, hound::Error> {
    let mut wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = f64::from(1_u32 << (spec.bits_per_sample - 1));
            wav.samples::<i32>()
                .map(|s| s.map(|v| (f64::from(v) / scale) as f32))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(Waveform::new(samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone() -> Waveform {
        Waveform::new(vec![0.0, 0.5, -0.5, 0.25], 24_000)
    }

    #[test]
    fn persist_names_files_by_sequence() {
        let store = ArtifactStore::new(None).unwrap();
        let artifact = store.persist(3, &tone(), "preview".into()).unwrap();
        assert_eq!(artifact.path.file_name().unwrap(), "chunk_3.wav");
        assert!(artifact.path.exists());
    }

    #[test]
    fn remove_deletes_the_file() {
        let store = ArtifactStore::new(None).unwrap();
        let artifact = store.persist(1, &tone(), String::new()).unwrap();
        store.remove(&artifact).unwrap();
        assert!(!artifact.path.exists());
    }

    #[test]
    fn removing_a_missing_artifact_is_an_explicit_error() {
        let store = ArtifactStore::new(None).unwrap();
        let artifact = store.persist(1, &tone(), String::new()).unwrap();
        store.remove(&artifact).unwrap();
        match store.remove(&artifact) {
            Err(PipelineError::ArtifactMissing(path)) => assert_eq!(path, artifact.path),
            other => panic!("expected ArtifactMissing, got {other:?}"),
        }
    }

    #[test]
    fn configured_scratch_dir_is_created_and_kept() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("speech-scratch");
        let store = ArtifactStore::new(Some(&dir)).unwrap();
        assert!(dir.is_dir());
        drop(store);
        assert!(dir.is_dir());
    }

    #[test]
    fn written_wav_decodes_back() {
        let store = ArtifactStore::new(None).unwrap();
        let artifact = store.persist(7, &tone(), String::new()).unwrap();
        let file = std::fs::File::open(&artifact.path).unwrap();
        let decoded = decode_wav(std::io::BufReader::new(file)).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.samples.len(), 4);
    }

    #[test]
    fn stereo_int_wav_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for frame in [[8192_i16, -8192], [16384, 16384]] {
            writer.write_sample(frame[0]).unwrap();
            writer.write_sample(frame[1]).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_wav(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(decoded.samples.len(), 2);
        assert!(decoded.samples[0].abs() < f32::EPSILON);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-3);
    }
}
