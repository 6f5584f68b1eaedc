//! CLI entry point — the composition root.
//!
//! The only place where concrete collaborators (HTTP synthesizer, audio
//! device, token source) are wired together; everything downstream takes
//! them by injection.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vocstream_cli::{Cli, Commands, handlers};
use vocstream_voice::TokenSourceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = cli.pipeline_config();
    let synth_url = cli.synth_url.clone();

    match cli.command {
        Commands::Speak { text, file, output } => {
            handlers::speak(config, synth_url, text, file, output).await
        }
        Commands::Chat {
            prompt,
            host,
            model,
        } => handlers::chat(config, synth_url, TokenSourceConfig { host, model }, prompt).await,
        Commands::Serve { addr, host, model } => {
            handlers::serve(config, synth_url, TokenSourceConfig { host, model }, addr).await
        }
    }
}
