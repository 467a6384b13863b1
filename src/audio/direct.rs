use async_trait::async_trait;
use futures_util::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{AudioFormat, DownloadStrategy};
use crate::Result;

/// Last-resort strategy for URLs that point straight at a media file: a
/// plain streamed HTTP download, no extraction tool involved.
pub struct DirectStrategy {
    client: reqwest::Client,
}

impl DirectStrategy {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Check if URL points to an audio or video file
    fn is_media_url(url: &str) -> bool {
        let url_lower = url.to_lowercase();

        let media_extensions = [
            ".mp3", ".m4a", ".wav", ".flac", ".ogg", ".aac", ".opus", ".mp4", ".webm", ".m4v",
        ];

        media_extensions.iter().any(|ext| url_lower.contains(ext))
    }

    fn format_from_url(url: &str) -> AudioFormat {
        url.rsplit('.')
            .next()
            .and_then(|ext| {
                // Strip query strings glued onto the extension.
                let ext = ext.split(['?', '#']).next().unwrap_or(ext);
                AudioFormat::from_extension(ext)
            })
            .unwrap_or(AudioFormat::Mp3)
    }
}

#[async_trait]
impl DownloadStrategy for DirectStrategy {
    async fn attempt(&self, url: &str, video_id: &str, work_dir: &Path) -> Result<PathBuf> {
        if !Self::is_media_url(url) {
            anyhow::bail!("not a direct media URL");
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("direct download failed: HTTP {}", response.status());
        }

        let format = Self::format_from_url(url);
        let audio_path = work_dir.join(format!("{}.{}", video_id, format.as_str()));

        let mut file = fs_err::File::create(&audio_path)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?)?;
        }

        Ok(audio_path)
    }

    fn name(&self) -> &'static str {
        "direct-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_media_url() {
        assert!(DirectStrategy::is_media_url("https://cdn.example.com/a.mp3"));
        assert!(DirectStrategy::is_media_url("https://cdn.example.com/a.MP4?sig=1"));
        assert!(!DirectStrategy::is_media_url("https://www.youtube.com/watch?v=x"));
    }

    #[test]
    fn test_format_from_url() {
        assert_eq!(
            DirectStrategy::format_from_url("https://x/a.m4a"),
            AudioFormat::M4a
        );
        assert_eq!(
            DirectStrategy::format_from_url("https://x/a.ogg?token=abc"),
            AudioFormat::Ogg
        );
        assert_eq!(
            DirectStrategy::format_from_url("https://x/clip"),
            AudioFormat::Mp3
        );
    }
}
