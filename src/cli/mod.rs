use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "videoscribe",
    about = "Videoscribe - transcribe and translate audio from YouTube, Facebook, TikTok and more",
    version,
    long_about = "A pipeline server and CLI that downloads audio from video platforms, transcribes it with whisper, and translates the transcript through a remote web endpoint or a locally hosted model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Bind address (overrides the configured one)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Run one transcription + translation pass from the command line
    Transcribe {
        /// Video URL to process
        #[arg(value_name = "URL")]
        url: String,

        /// Target language for the translation
        #[arg(short, long, value_name = "LANG")]
        target_lang: Option<String>,

        /// Platform hint (youtube, facebook, tiktok, instagram, vimeo)
        #[arg(short, long, value_name = "PLATFORM")]
        platform: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or scaffold the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with the full result object
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
