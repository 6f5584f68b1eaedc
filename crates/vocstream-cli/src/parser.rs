//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;
use vocstream_core::{PipelineConfig, SynthesisOptions};

use crate::commands::Commands;

/// Command-line interface for the streaming speech service.
#[derive(Parser)]
#[command(name = "vocstream")]
#[command(about = "Stream model responses into low-latency speech")]
#[command(version)]
pub struct Cli {
    /// Base URL of the speech-synthesis server
    #[arg(
        long = "synth-url",
        global = true,
        env = "VOCSTREAM_SYNTH_URL",
        default_value = "http://localhost:5005"
    )]
    pub synth_url: String,

    /// Language code passed to the synthesizer
    #[arg(long, global = true, default_value = "ko")]
    pub language: String,

    /// Voice style identifier
    #[arg(long = "voice-style", global = true, default_value = "M1")]
    pub voice_style: String,

    /// Speaking-speed multiplier
    #[arg(long, global = true, default_value_t = 1.2)]
    pub speed: f32,

    /// Pre-rendered filler clip played at pipeline start
    #[arg(long, global = true)]
    pub filler: Option<PathBuf>,

    /// Scratch directory for audio artifacts (default: a private temp dir)
    #[arg(long = "scratch-dir", global = true)]
    pub scratch_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Pipeline configuration assembled from the global flags.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scratch_dir: self.scratch_dir.clone(),
            filler_wav: self.filler.clone(),
            synthesis: SynthesisOptions {
                language: self.language.clone(),
                voice_style: self.voice_style.clone(),
                speed: self.speed,
                ..SynthesisOptions::default()
            },
            ..PipelineConfig::default()
        }
    }
}
