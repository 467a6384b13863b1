use once_cell::sync::Lazy;
use regex::Regex;

/// Right-to-left mark, prefixed to paragraphs of RTL translations so
/// mixed-direction text renders with the correct base direction.
const RLM: char = '\u{200F}';

/// Lines below this similarity are considered distinct; at or above it the
/// later line is dropped as a repetition artifact.
const DUPLICATE_LINE_THRESHOLD: f64 = 0.7;

static CUE_TIMING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*\d{1,2}:\d{2}(?::\d{2})?[.,]\d{3}\s*-->\s*\d{1,2}:\d{2}(?::\d{2})?[.,]\d{3}.*$").unwrap()
});
static CUE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[ \t]*$").unwrap());
static VTT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:WEBVTT|NOTE\b.*|Kind:.*|Language:.*)\s*$").unwrap());
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static INLINE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d{1,2}:\d{2}(?::\d{2})?\]").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,!?:;])").unwrap());

/// Clean raw speech-to-text output for presentation and storage.
///
/// Auto-generated captions carry timing lines, cue numbers, inline tags,
/// and near-duplicate consecutive lines (the same phrase re-emitted as the
/// recognizer refines it). All of that is stripped here so every consumer
/// sees plain prose.
pub fn clean_transcript(text: &str) -> String {
    let text = strip_caption_markup(text);
    let lines = dedupe_similar_lines(text.lines());
    let joined = lines.join(" ");

    let collapsed = MULTI_SPACE.replace_all(&joined, " ");
    let punctuated = SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");

    capitalize_sentences(punctuated.trim())
}

fn strip_caption_markup(text: &str) -> String {
    let text = CUE_TIMING.replace_all(text, "");
    let text = CUE_NUMBER.replace_all(&text, "");
    let text = VTT_HEADER.replace_all(&text, "");
    let text = MARKUP_TAG.replace_all(&text, "");
    INLINE_TIMESTAMP.replace_all(&text, "").into_owned()
}

fn dedupe_similar_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(previous) = kept.last() {
            if line_similarity(previous, line) >= DUPLICATE_LINE_THRESHOLD {
                continue;
            }
        }
        kept.push(line.to_string());
    }

    kept
}

/// Character-position overlap between two lines, 0.0..=1.0.
///
/// Positionally compares characters and divides by the longer length, which
/// is enough to catch the grow-by-a-word repetitions captions produce.
pub fn line_similarity(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let longest = a_chars.len().max(b_chars.len());
    if longest == 0 {
        return 1.0;
    }

    let matching = a_chars
        .iter()
        .zip(b_chars.iter())
        .filter(|(x, y)| x == y)
        .count();

    matching as f64 / longest as f64
}

fn capitalize_sentences(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_sentence_start = true;

    for c in text.chars() {
        if at_sentence_start && c.is_alphabetic() {
            result.extend(c.to_uppercase());
            at_sentence_start = false;
        } else {
            if matches!(c, '.' | '!' | '?') {
                at_sentence_start = true;
            }
            result.push(c);
        }
    }

    result
}

/// Whether translations into `lang` read right-to-left.
pub fn is_rtl_language(lang: &str) -> bool {
    matches!(lang, "he" | "iw" | "ar" | "fa")
}

/// Post-process a translation for a right-to-left target language: prefix
/// each non-empty paragraph with an RLM and tighten punctuation spacing.
/// Left-to-right targets pass through untouched.
pub fn apply_rtl_postprocessing(text: &str, target_lang: &str) -> String {
    if !is_rtl_language(target_lang) {
        return text.to_string();
    }

    let marked: Vec<String> = text
        .split('\n')
        .map(|paragraph| {
            let trimmed = paragraph.trim_start_matches(RLM);
            if trimmed.trim().is_empty() {
                paragraph.to_string()
            } else {
                format!("{}{}", RLM, trimmed)
            }
        })
        .collect();

    SPACE_BEFORE_PUNCT
        .replace_all(&marked.join("\n"), "$1")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_vtt_cues() {
        let raw = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\nHello there\n\n2\n00:00:04.000 --> 00:00:07.000\nGeneral Kenobi\n";
        let cleaned = clean_transcript(raw);
        assert_eq!(cleaned, "Hello there General Kenobi");
    }

    #[test]
    fn test_strips_tags_and_inline_timestamps() {
        let raw = "<i>Hello</i> world [00:12] again";
        assert_eq!(clean_transcript(raw), "Hello world again");
    }

    #[test]
    fn test_collapses_whitespace_and_punctuation() {
        let raw = "hello   world .  how are  you ?";
        assert_eq!(clean_transcript(raw), "Hello world. How are you?");
    }

    #[test]
    fn test_drops_near_duplicate_consecutive_lines() {
        let raw = "the quick brown fox\nthe quick brown fox j\nsomething else entirely";
        let cleaned = clean_transcript(raw);
        assert_eq!(cleaned, "The quick brown fox something else entirely");
    }

    #[test]
    fn test_keeps_distinct_lines() {
        let raw = "first line of speech\ntotally different words";
        let cleaned = clean_transcript(raw);
        assert!(cleaned.contains("first line of speech") || cleaned.starts_with("First"));
        assert!(cleaned.contains("totally different words"));
    }

    #[test]
    fn test_line_similarity_bounds() {
        assert_eq!(line_similarity("", ""), 1.0);
        assert_eq!(line_similarity("abc", "abc"), 1.0);
        assert_eq!(line_similarity("abc", "xyz"), 0.0);
        let partial = line_similarity("hello world", "hello walto");
        assert!(partial > 0.5 && partial < 1.0);
    }

    #[test]
    fn test_rtl_marks_once_per_paragraph() {
        let text = "שלום עולם\n\nעוד פסקה";
        let processed = apply_rtl_postprocessing(text, "he");
        let marks = processed.matches('\u{200F}').count();
        assert_eq!(marks, 2);

        // Running it twice must not stack marks.
        let twice = apply_rtl_postprocessing(&processed, "he");
        assert_eq!(twice.matches('\u{200F}').count(), 2);
    }

    #[test]
    fn test_ltr_targets_untouched() {
        let text = "hello world";
        assert_eq!(apply_rtl_postprocessing(text, "en"), text);
    }

    #[test]
    fn test_rtl_language_set() {
        assert!(is_rtl_language("he"));
        assert!(is_rtl_language("ar"));
        assert!(!is_rtl_language("en"));
        assert!(!is_rtl_language("ru"));
    }
}
