use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{RawTranscription, TranscribeStrategy};
use crate::Result;

/// Structured output of the transcriber script.
#[derive(Debug, Deserialize)]
struct ScriptReport {
    success: bool,
    transcript: Option<String>,
    language: Option<String>,
    error: Option<String>,
}

/// Primary strategy: inter-process call to the transcriber script, which
/// loads the model and prints a single JSON object on stdout:
/// `{"success": bool, "transcript": str?, "language": str?, "error": str?}`.
pub struct WhisperJsonStrategy {
    python_path: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl WhisperJsonStrategy {
    pub fn new(python_path: &str, script_path: &Path, timeout_secs: u64) -> Self {
        Self {
            python_path: python_path.to_string(),
            script_path: script_path.to_path_buf(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl TranscribeStrategy for WhisperJsonStrategy {
    async fn attempt(&self, audio_path: &Path) -> Result<RawTranscription> {
        if !audio_path.exists() {
            anyhow::bail!("audio file not found: {}", audio_path.display());
        }

        let child = Command::new(&self.python_path)
            .arg(&self.script_path)
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => anyhow::bail!(
                "transcriber script timed out after {}s",
                self.timeout.as_secs()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_script_report(&stdout)?;

        if !report.success {
            anyhow::bail!(
                "transcriber script failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(RawTranscription {
            transcript: report.transcript.unwrap_or_default(),
            language: report.language,
        })
    }

    fn name(&self) -> &'static str {
        "whisper-script"
    }
}

fn parse_script_report(stdout: &str) -> Result<ScriptReport> {
    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(report) = serde_json::from_str::<ScriptReport>(line) {
            return Ok(report);
        }
    }

    anyhow::bail!("no JSON report found in transcriber output")
}

/// JSON artifact the whisper CLI writes next to its other outputs.
#[derive(Debug, Deserialize)]
struct WhisperCliArtifact {
    text: String,
    language: Option<String>,
}

/// Fallback strategy: raw command-line invocation of the whisper CLI with
/// the JSON artifact parsed off disk afterwards. Slower to start (the CLI
/// reloads the model every run) but independent of the script environment.
pub struct WhisperCliStrategy {
    whisper_path: String,
    model: String,
    timeout: Duration,
}

impl WhisperCliStrategy {
    pub fn new(whisper_path: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            whisper_path: whisper_path.to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl TranscribeStrategy for WhisperCliStrategy {
    async fn attempt(&self, audio_path: &Path) -> Result<RawTranscription> {
        if !audio_path.exists() {
            anyhow::bail!("audio file not found: {}", audio_path.display());
        }

        let out_dir = tempfile::tempdir()?;

        let child = Command::new(&self.whisper_path)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .args(["--output_format", "json", "--output_dir"])
            .arg(out_dir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => anyhow::bail!("whisper timed out after {}s", self.timeout.as_secs()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper exited with {}: {}", output.status, stderr.trim());
        }

        let stem = audio_path
            .file_stem()
            .ok_or_else(|| anyhow::anyhow!("audio path has no file stem"))?;
        let artifact_path = out_dir.path().join(format!("{}.json", stem.to_string_lossy()));
        let artifact = fs_err::read_to_string(&artifact_path)?;
        let parsed: WhisperCliArtifact = serde_json::from_str(&artifact)?;

        Ok(RawTranscription {
            transcript: parsed.text,
            language: parsed.language,
        })
    }

    fn name(&self) -> &'static str {
        "whisper-cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_report_with_noise() {
        let stdout = "Audio file size: 12345 bytes\n{\"success\": true, \"transcript\": \"hi there\", \"language\": \"en\"}\n";
        let report = parse_script_report(stdout).unwrap();
        assert!(report.success);
        assert_eq!(report.transcript.as_deref(), Some("hi there"));
        assert_eq!(report.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_script_report_failure() {
        let stdout = "{\"success\": false, \"error\": \"Audio file not found: /x.mp3\"}";
        let report = parse_script_report(stdout).unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_parse_whisper_cli_artifact() {
        let artifact = r#"{"text": " Hello world.", "segments": [], "language": "en"}"#;
        let parsed: WhisperCliArtifact = serde_json::from_str(artifact).unwrap();
        assert_eq!(parsed.text, " Hello world.");
        assert_eq!(parsed.language.as_deref(), Some("en"));
    }
}
