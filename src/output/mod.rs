use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::PipelineResult;

/// Save a pipeline result to file
pub async fn save_to_file(result: &PipelineResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_as_text(result),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    };

    fs_err::write(path, content)?;
    Ok(())
}

/// Print a pipeline result to console
pub fn print_to_console(result: &PipelineResult, format: &OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => format_as_text(result),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    };

    println!("{}", content);
    Ok(())
}

fn format_as_text(result: &PipelineResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("Title: {}\n", result.title));
    if let Some(domain) = crate::utils::extract_domain(&result.url) {
        out.push_str(&format!("Source: {}\n", domain));
    }
    out.push_str(&format!(
        "Language: {} -> {}\n",
        result.detected_language, result.target_language
    ));
    if let Some(audio_path) = &result.audio_path {
        out.push_str(&format!("Audio: {}\n", audio_path.display()));
    }
    if result.is_fallback_transcript {
        out.push_str("Note: fallback transcript (no usable audio)\n");
    }
    if let Some(error) = &result.error {
        out.push_str(&format!("Warning: {}\n", error));
    }

    out.push_str("\n--- Transcript ---\n");
    out.push_str(&result.transcript);
    out.push_str("\n\n--- Translation ---\n");
    out.push_str(&result.translation);
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PipelineResult {
        PipelineResult {
            success: true,
            request_id: "req-1-a".to_string(),
            video_id: "vid1".to_string(),
            url: "https://www.youtube.com/watch?v=vid1".to_string(),
            title: "Sample".to_string(),
            transcript: "hello".to_string(),
            translation: "שלום".to_string(),
            detected_language: "en".to_string(),
            target_language: "he".to_string(),
            audio_path: None,
            is_fallback_transcript: false,
            error: None,
        }
    }

    #[test]
    fn test_text_format_sections() {
        let text = format_as_text(&sample());
        assert!(text.contains("Title: Sample"));
        assert!(text.contains("Source: youtube.com"));
        assert!(text.contains("--- Transcript ---"));
        assert!(text.contains("--- Translation ---"));
        assert!(text.contains("שלום"));
    }

    #[test]
    fn test_fallback_note_present() {
        let mut result = sample();
        result.is_fallback_transcript = true;
        assert!(format_as_text(&result).contains("fallback transcript"));
    }
}
