use once_cell::sync::Lazy;
use regex::Regex;

/// Best-guess language classification for free text.
///
/// Kept behind a trait so the keyword heuristic can be swapped for a real
/// language-identification library without touching the pipeline.
pub trait LanguageDetector: Send + Sync {
    /// Returns an ISO-639-1-like code from the supported set.
    fn detect(&self, text: &str) -> String;
}

/// Languages the detector can distinguish. Everything else scores zero and
/// resolves to the English default.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "fr", "de", "it", "ru", "ar"];

struct LanguagePattern {
    code: &'static str,
    pattern: Regex,
}

fn word_pattern(words: &[&str]) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).unwrap()
}

static PATTERNS: Lazy<Vec<LanguagePattern>> = Lazy::new(|| {
    vec![
        LanguagePattern {
            code: "en",
            pattern: word_pattern(&["the", "and", "to", "for", "with", "that"]),
        },
        LanguagePattern {
            code: "es",
            pattern: word_pattern(&["el", "la", "los", "las", "que", "una", "por", "como"]),
        },
        LanguagePattern {
            code: "fr",
            pattern: word_pattern(&["le", "les", "des", "est", "une", "dans", "pour", "je"]),
        },
        LanguagePattern {
            code: "de",
            pattern: word_pattern(&["der", "die", "das", "und", "ist", "nicht", "ich", "ein"]),
        },
        LanguagePattern {
            code: "it",
            pattern: word_pattern(&["il", "gli", "che", "di", "una", "per", "con", "sono"]),
        },
        LanguagePattern {
            code: "ru",
            pattern: word_pattern(&["и", "в", "не", "на", "что", "он", "это", "как"]),
        },
        LanguagePattern {
            code: "ar",
            pattern: word_pattern(&["في", "من", "على", "هذا", "أن", "إلى", "عن", "مع"]),
        },
    ]
});

/// Heuristic detector scoring occurrences of common function words.
///
/// This is a fallback for when the transcription tool does not report a
/// language; misclassification of short or mixed-language text is expected
/// and tolerated downstream.
pub struct KeywordDetector;

impl KeywordDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for KeywordDetector {
    fn detect(&self, text: &str) -> String {
        let mut best = ("en", 0usize);

        for lang in PATTERNS.iter() {
            let score = lang.pattern.find_iter(text).count();
            if score > best.1 {
                best = (lang.code, score);
            }
        }

        best.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_pattern_words() {
        let detector = KeywordDetector::new();
        assert_eq!(detector.detect("the and to for the and to for"), "en");
    }

    #[test]
    fn test_no_matches_defaults_to_english() {
        let detector = KeywordDetector::new();
        assert_eq!(detector.detect("xyzzy plugh 12345"), "en");
        assert_eq!(detector.detect(""), "en");
    }

    #[test]
    fn test_spanish_text() {
        let detector = KeywordDetector::new();
        let text = "el perro corre por la calle y los gatos miran como una sombra";
        assert_eq!(detector.detect(text), "es");
    }

    #[test]
    fn test_german_text() {
        let detector = KeywordDetector::new();
        let text = "der hund und die katze sind nicht im haus, ich sehe ein auto";
        assert_eq!(detector.detect(text), "de");
    }

    #[test]
    fn test_russian_text() {
        let detector = KeywordDetector::new();
        let text = "он сказал что это не на столе и как всегда был прав";
        assert_eq!(detector.detect(text), "ru");
    }

    #[test]
    fn test_arabic_text() {
        let detector = KeywordDetector::new();
        let text = "هذا الكتاب من المكتبة على الطاولة في الغرفة";
        assert_eq!(detector.detect(text), "ar");
    }
}
