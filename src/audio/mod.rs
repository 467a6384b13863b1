use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod direct;
pub mod script;
pub mod ytdlp;

use crate::Result;

/// Audio formats the downloader may leave behind, in probe order. yt-dlp's
/// post-processing does not always honor the requested container, so every
/// extension is checked when locating the result.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "webm", "wav", "mp4", "ogg", "flac"];

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Opus,
    Webm,
    Wav,
    Mp4,
    Ogg,
    Flac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Webm => "webm",
            AudioFormat::Wav => "wav",
            AudioFormat::Mp4 => "mp4",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "opus" => Some(AudioFormat::Opus),
            "webm" => Some(AudioFormat::Webm),
            "wav" => Some(AudioFormat::Wav),
            "mp4" => Some(AudioFormat::Mp4),
            "ogg" => Some(AudioFormat::Ogg),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp4 => "video/mp4",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

/// Outcome of the audio acquisition stage. On failure the expected path is
/// still reported so callers can present "no audio" instead of crashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub audio_path: PathBuf,
    pub strategy: Option<String>,
    pub error: Option<String>,
}

/// One way of fetching audio for a URL. Strategies are tried in order until
/// one produces a file.
#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    /// Attempt the download, returning the path of the produced audio file.
    async fn attempt(&self, url: &str, video_id: &str, work_dir: &Path) -> Result<PathBuf>;

    /// Strategy name for logs and the outcome record.
    fn name(&self) -> &'static str;
}

/// Ordered-fallback audio downloader.
pub struct AudioDownloader {
    strategies: Vec<Box<dyn DownloadStrategy>>,
}

impl AudioDownloader {
    /// Downloader with the default strategy order: yt-dlp first, then the
    /// scripted fallback when one is configured.
    pub fn new(config: &crate::config::ToolsConfig) -> Self {
        let mut strategies: Vec<Box<dyn DownloadStrategy>> = vec![Box::new(
            ytdlp::YtDlpStrategy::new(&config.yt_dlp_path, config.download_timeout_secs),
        )];

        if let Some(script) = &config.downloader_script {
            strategies.push(Box::new(script::ScriptStrategy::new(
                &config.python_path,
                script,
                config.download_timeout_secs,
            )));
        }

        strategies.push(Box::new(direct::DirectStrategy::new(
            config.download_timeout_secs,
        )));

        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn DownloadStrategy>>) -> Self {
        Self { strategies }
    }

    /// Fetch audio for `url` into `work_dir`.
    ///
    /// Never returns an error: every strategy failure is folded into the
    /// outcome, and a final directory search tolerates external tools that
    /// name their output unpredictably.
    pub async fn download(&self, url: &str, video_id: &str, work_dir: &Path) -> DownloadOutcome {
        let expected = work_dir.join(format!("{}.mp3", video_id));
        let mut last_error = String::from("no download strategies configured");

        for strategy in &self.strategies {
            tracing::info!("Trying download strategy '{}' for {}", strategy.name(), url);

            match strategy.attempt(url, video_id, work_dir).await {
                Ok(path) if path.exists() => {
                    tracing::info!(
                        "Strategy '{}' produced {}",
                        strategy.name(),
                        path.display()
                    );
                    return DownloadOutcome {
                        success: true,
                        audio_path: path,
                        strategy: Some(strategy.name().to_string()),
                        error: None,
                    };
                }
                Ok(path) => {
                    // The tool claimed success but the file is missing; fall
                    // through to the directory search before giving up on it.
                    tracing::warn!(
                        "Strategy '{}' reported {} but the file does not exist",
                        strategy.name(),
                        path.display()
                    );
                    last_error = format!("{}: reported file missing", strategy.name());
                }
                Err(e) => {
                    tracing::warn!("Strategy '{}' failed: {:#}", strategy.name(), e);
                    last_error = format!("{}: {:#}", strategy.name(), e);
                }
            }

            if let Some(found) = locate_audio_file(work_dir, video_id) {
                tracing::info!("Found audio by directory search: {}", found.display());
                return DownloadOutcome {
                    success: true,
                    audio_path: found,
                    strategy: Some(strategy.name().to_string()),
                    error: None,
                };
            }
        }

        tracing::error!("All download strategies failed for {}: {}", url, last_error);
        DownloadOutcome {
            success: false,
            audio_path: expected,
            strategy: None,
            error: Some(last_error),
        }
    }
}

/// Search `dir` for audio belonging to `video_id`: first the exact
/// `<id>.<ext>` names, then any file whose name contains the id.
pub fn locate_audio_file(dir: &Path, video_id: &str) -> Option<PathBuf> {
    for ext in AUDIO_EXTENSIONS {
        let candidate = dir.join(format!("{}.{}", video_id, ext));
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let has_audio_ext = path
            .extension()
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
            .unwrap_or(false);
        if has_audio_ext && name.contains(video_id) {
            return Some(path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedStrategy {
        name: &'static str,
        result: Option<PathBuf>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DownloadStrategy for FixedStrategy {
        async fn attempt(&self, _url: &str, _video_id: &str, _work_dir: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(path) => Ok(path.clone()),
                None => anyhow::bail!("strategy unavailable"),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[test]
    fn test_format_round_trip() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("aac"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_extension("txt"), None);
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_fallback_order() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("vid123.mp3");
        fs_err::write(&audio, b"fake audio").unwrap();

        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let downloader = AudioDownloader::with_strategies(vec![
            Box::new(FixedStrategy {
                name: "always-fails",
                result: None,
                calls: first_calls.clone(),
            }),
            Box::new(FixedStrategy {
                name: "succeeds",
                result: Some(audio.clone()),
                calls: second_calls.clone(),
            }),
        ]);

        // The failing strategy is rescued by the directory search, so the
        // second one is never consulted.
        let outcome = downloader
            .download("https://example.com/v", "vid123", dir.path())
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.audio_path, audio);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_reports_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let downloader = AudioDownloader::with_strategies(vec![Box::new(FixedStrategy {
            name: "always-fails",
            result: None,
            calls,
        })]);

        let outcome = downloader
            .download("https://example.com/v", "missing1", dir.path())
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.audio_path, dir.path().join("missing1.mp3"));
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_locate_by_substring_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(dir.path().join("prefix_vid42_audio.m4a"), b"x").unwrap();
        fs_err::write(dir.path().join("vid42.txt"), b"x").unwrap();

        let found = locate_audio_file(dir.path(), "vid42").unwrap();
        assert_eq!(found, dir.path().join("prefix_vid42_audio.m4a"));
        assert!(locate_audio_file(dir.path(), "other").is_none());
    }
}
