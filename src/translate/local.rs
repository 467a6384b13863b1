use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{Direction, ProgressScale, ProviderKind, Translated, TranslationProvider, TranslationRequest};
use crate::progress::{self, ProgressStore};
use crate::text;
use crate::Result;

static PROGRESS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Translation progress: (\d{1,3})%").unwrap());

/// Structured output of the model-server script.
#[derive(Debug, Deserialize)]
struct ScriptReport {
    success: bool,
    translation: Option<String>,
    #[serde(default)]
    used_nllb: bool,
    error: Option<String>,
}

/// Locally hosted neural translation model, reached through a long-running
/// script invocation.
///
/// The script prints percentage diagnostics to stderr while it works
/// (`Translation progress: NN%`); those are streamed into the progress
/// store so pollers see movement during long translations. The final
/// result arrives as one JSON object on stdout.
pub struct LocalModelTranslator {
    python_path: String,
    script_path: PathBuf,
    timeout: Duration,
    progress: Arc<dyn ProgressStore>,
}

impl LocalModelTranslator {
    pub fn new(
        python_path: &str,
        script_path: &Path,
        timeout_secs: u64,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            python_path: python_path.to_string(),
            script_path: script_path.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
            progress,
        }
    }
}

#[async_trait]
impl TranslationProvider for LocalModelTranslator {
    async fn translate(
        &self,
        req: &TranslationRequest,
        scale: ProgressScale,
    ) -> Result<Translated> {
        let mut child = Command::new(&self.python_path)
            .arg(&self.script_path)
            .arg(&req.text)
            .arg(&req.target_lang)
            .arg(&req.source_lang)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Stream stage progress off stderr while the model works.
        if let Some(stderr) = child.stderr.take() {
            let store = self.progress.clone();
            let request_id = req.request_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(percent) = parse_progress_line(&line) {
                        progress::report(
                            &*store,
                            &request_id,
                            scale.apply(percent),
                            "translating with local model",
                        );
                    } else {
                        tracing::debug!("model server: {}", line);
                    }
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => anyhow::bail!(
                "local model translation timed out after {}s",
                self.timeout.as_secs()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_report(&stdout)?;

        if !report.success {
            anyhow::bail!(
                "local model failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }

        if !report.used_nllb {
            tracing::warn!(
                "Local model fell back to its dictionary mode for {}",
                req.request_id
            );
        }

        let translation = report
            .translation
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("local model returned empty translation"))?;

        let finished = text::apply_rtl_postprocessing(&translation, &req.target_lang);

        Ok(Translated {
            translation: finished,
            direction: Direction::for_language(&req.target_lang),
            provider: ProviderKind::Local,
        })
    }

    fn name(&self) -> &'static str {
        "local-model"
    }
}

fn parse_progress_line(line: &str) -> Option<u8> {
    PROGRESS_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(|p| p.min(100))
}

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

    anyhow::bail!("no JSON report found in model server output")
}
