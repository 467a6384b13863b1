//! Videoscribe - a transcription and translation pipeline for online video
//!
//! This library turns a video URL into a transcript and a translation by
//! orchestrating external tools: a downloader (yt-dlp with a scripted
//! fallback), a speech-to-text tool (whisper), and two translation
//! providers (a remote web endpoint and a locally hosted model server).

pub mod audio;
pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod server;
pub mod store;
pub mod text;
pub mod training;
pub mod transcribe;
pub mod translate;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use pipeline::{Pipeline, PipelineRequest, PipelineResult};
pub use resolver::Platform;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the pipeline
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Audio download failed: {0}")]
    AudioDownloadFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Storage operation failed: {0}")]
    StorageFailed(String),
}
