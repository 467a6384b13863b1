use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::DownloadStrategy;
use crate::Result;

/// Structured output of the fallback downloader script.
#[derive(Debug, Deserialize)]
struct ScriptReport {
    success: bool,
    #[serde(rename = "audioPath")]
    audio_path: Option<String>,
    error: Option<String>,
}

/// Fallback downloader invoking an external script that tries its own chain
/// of download libraries and reports the result as one JSON object on
/// stdout: `{"success": bool, "audioPath": str?, "error": str?}`.
pub struct ScriptStrategy {
    python_path: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl ScriptStrategy {
    pub fn new(python_path: &str, script_path: &Path, timeout_secs: u64) -> Self {
        Self {
            python_path: python_path.to_string(),
            script_path: script_path.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl DownloadStrategy for ScriptStrategy {
    async fn attempt(&self, url: &str, _video_id: &str, work_dir: &Path) -> Result<PathBuf> {
        let child = Command::new(&self.python_path)
            .arg(&self.script_path)
            .arg(url)
            .arg(work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(
                    "Downloader script exceeded {}s for {}, killing",
                    self.timeout.as_secs(),
                    url
                );
                anyhow::bail!(
                    "downloader script timed out after {}s",
                    self.timeout.as_secs()
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_report(&stdout)?;

        if !report.success {
            anyhow::bail!(
                "downloader script failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }

        let path = report
            .audio_path
            .ok_or_else(|| anyhow::anyhow!("downloader script reported success without a path"))?;

        Ok(PathBuf::from(path))
    }

    fn name(&self) -> &'static str {
        "downloader-script"
    }
}

/// The script logs freely to stderr but may also leak stray lines onto
/// stdout before the report, so scan for the first parsable JSON object.
fn parse_report(stdout: &str) -> Result<ScriptReport> {
    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(report) = serde_json::from_str::<ScriptReport>(line) {
            return Ok(report);
        }
    }

    anyhow::bail!("no JSON report found in downloader script output")
}
