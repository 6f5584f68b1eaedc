//! Subcommand definitions.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Subcommand;

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak a complete text as one utterance
    Speak {
        /// Text to speak (or use --file)
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(long)]
        file: Option<PathBuf>,

        /// Render to a WAV file instead of playing
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Stream a model response and speak it while it is generated
    Chat {
        /// Prompt for the model
        prompt: String,

        /// Base URL of the token source
        #[arg(long, env = "VOCSTREAM_LLM_HOST", default_value = "http://localhost:11434")]
        host: String,

        /// Model identifier
        #[arg(long, default_value = "qwen2.5:1.5b")]
        model: String,
    },

    /// Run the HTTP control surface
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8765")]
        addr: SocketAddr,

        /// Base URL of the token source
        #[arg(long, env = "VOCSTREAM_LLM_HOST", default_value = "http://localhost:11434")]
        host: String,

        /// Model identifier
        #[arg(long, default_value = "qwen2.5:1.5b")]
        model: String,
    },
}
