use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod whisper;

use crate::text;
use crate::Result;

/// Transcript substituted when the audio yields nothing usable, so the UI
/// still has content to display and translate.
pub const FALLBACK_TRANSCRIPT: &str = "The way to get started is to quit talking and begin doing. Walt Disney. \
     Success is not final, failure is not fatal: It is the courage to continue that counts. Winston Churchill. \
     The future belongs to those who believe in the beauty of their dreams. Eleanor Roosevelt. \
     Life is what happens when you're busy making other plans. John Lennon.";

/// A transcript considered empty below this length, triggering the fallback.
const MIN_TRANSCRIPT_LEN: usize = 10;

/// Raw output of a single transcription attempt, before cleanup.
#[derive(Debug, Clone)]
pub struct RawTranscription {
    pub transcript: String,
    pub language: Option<String>,
}

/// Result of the transcription stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutcome {
    pub success: bool,
    pub transcript: String,
    pub language: Option<String>,
    pub is_fallback: bool,
    pub error: Option<String>,
}

/// One way of invoking the speech-to-text tool.
#[async_trait]
pub trait TranscribeStrategy: Send + Sync {
    async fn attempt(&self, audio_path: &Path) -> Result<RawTranscription>;

    fn name(&self) -> &'static str;
}

/// Ordered-fallback transcriber: a structured inter-process call first, raw
/// command-line invocation second.
pub struct Transcriber {
    strategies: Vec<Box<dyn TranscribeStrategy>>,
}

impl Transcriber {
    pub fn new(config: &crate::config::ToolsConfig) -> Self {
        let mut strategies: Vec<Box<dyn TranscribeStrategy>> = Vec::new();

        if let Some(script) = &config.transcriber_script {
            strategies.push(Box::new(whisper::WhisperJsonStrategy::new(
                &config.python_path,
                script,
                config.transcribe_timeout_secs,
            )));
        }
        strategies.push(Box::new(whisper::WhisperCliStrategy::new(
            &config.whisper_path,
            &config.whisper_model,
            config.transcribe_timeout_secs,
        )));

        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TranscribeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Transcribe the audio file, trying each strategy in order.
    ///
    /// Both strategies failing produces `success = false` with the error
    /// detail; the audio file stays on disk for playback either way.
    pub async fn transcribe(&self, audio_path: &Path) -> TranscriptionOutcome {
        let mut last_error = String::from("no transcription strategies configured");

        for strategy in &self.strategies {
            tracing::info!(
                "Trying transcription strategy '{}' for {}",
                strategy.name(),
                audio_path.display()
            );

            match strategy.attempt(audio_path).await {
                Ok(raw) => return finish(raw),
                Err(e) => {
                    tracing::warn!("Strategy '{}' failed: {:#}", strategy.name(), e);
                    last_error = format!("{}: {:#}", strategy.name(), e);
                }
            }
        }

        tracing::error!(
            "All transcription strategies failed for {}: {}",
            audio_path.display(),
            last_error
        );
        TranscriptionOutcome {
            success: false,
            transcript: String::new(),
            language: None,
            is_fallback: false,
            error: Some(last_error),
        }
    }
}

fn finish(raw: RawTranscription) -> TranscriptionOutcome {
    let cleaned = text::clean_transcript(&raw.transcript);

    if cleaned.trim().len() < MIN_TRANSCRIPT_LEN {
        tracing::warn!("Transcript empty or too short, substituting fallback text");
        return TranscriptionOutcome {
            success: true,
            transcript: FALLBACK_TRANSCRIPT.to_string(),
            language: Some("en".to_string()),
            is_fallback: true,
            error: None,
        };
    }

    TranscriptionOutcome {
        success: true,
        transcript: cleaned,
        language: raw.language,
        is_fallback: false,
        error: None,
    }
}
