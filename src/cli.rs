//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "talkback", version, about = "Streaming voice conversation pipeline")]
pub struct Cli {
    /// Path to a config file (default: ~/.config/talkback/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Audio input device name (see `talkback devices`)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Path to the speech recognition model file
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Language code for transcription ("en", "es", ..., or "auto")
    #[arg(short, long)]
    pub language: Option<String>,

    /// Transcribe a WAV file instead of the microphone
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Transcribe only; do not generate replies
    #[arg(long)]
    pub no_reply: bool,

    /// Suppress state and progress output
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,
}
