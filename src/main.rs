// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "avrec")]
#[command(about = "Real-time audio/video capture-to-file recording")]
#[command(version = avrec::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record video and audio from the default PipeWire devices
    Record {
        /// Recording duration in seconds (Ctrl+C stops early)
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Save into this directory instead of the video library
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable audio capture
        #[arg(long)]
        no_audio: bool,

        /// Explicit PipeWire video target (serial or node name)
        #[arg(long)]
        video_target: Option<String>,

        /// Explicit PipeWire audio target (serial or node name)
        #[arg(long)]
        audio_target: Option<String>,
    },

    /// List available encoder elements
    Encoders,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=avrec=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            duration,
            output,
            no_audio,
            video_target,
            audio_target,
        } => cli::record(duration, output, no_audio, video_target, audio_target),
        Commands::Encoders => cli::list_encoders(),
    }
}
