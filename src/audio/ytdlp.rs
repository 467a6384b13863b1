use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::DownloadStrategy;
use crate::Result;

/// Primary audio downloader, shelling out to yt-dlp.
///
/// The invocation disables certificate checks and forces IPv4; the target
/// environments this serves sit behind interception proxies and broken
/// IPv6, and yt-dlp otherwise fails on both.
pub struct YtDlpStrategy {
    yt_dlp_path: String,
    timeout: Duration,
}

impl YtDlpStrategy {
    pub fn new(yt_dlp_path: &str, timeout_secs: u64) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl DownloadStrategy for YtDlpStrategy {
    async fn attempt(&self, url: &str, video_id: &str, work_dir: &Path) -> Result<PathBuf> {
        if !self.check_availability().await {
            anyhow::bail!(
                "yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp"
            );
        }

        let output_template = work_dir.join(format!("{}.%(ext)s", video_id));

        let child = Command::new(&self.yt_dlp_path)
            .args([
                "--no-check-certificate",
                "--force-ipv4",
                "--no-warnings",
                "--no-playlist",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "0",
                url,
                "-o",
            ])
            .arg(&output_template)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                // Dropping the wait future kills the child (kill_on_drop),
                // freeing the slot for the fallback strategy.
                tracing::warn!(
                    "yt-dlp exceeded {}s for {}, killing",
                    self.timeout.as_secs(),
                    url
                );
                anyhow::bail!("yt-dlp timed out after {}s", self.timeout.as_secs());
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp exited with {}: {}", output.status, stderr.trim());
        }

        Ok(work_dir.join(format!("{}.mp3", video_id)))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
