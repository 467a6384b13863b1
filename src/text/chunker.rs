use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)(.*?[.!?])\s+").unwrap());
static CLAUSE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)(.*?[,;])\s*").unwrap());

/// Split `text` into chunks of at most `max_len` characters.
///
/// The remote translation endpoint silently truncates oversized payloads,
/// so long text must be split before submission and reassembled after.
/// Boundaries fall on sentence ends where possible, clause ends second,
/// and plain word packing as a last resort. A single word longer than
/// `max_len` is emitted as its own (oversized) chunk rather than split,
/// so rejoining the chunks with single spaces preserves the word sequence.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_with_pattern(text, &SENTENCE_BOUNDARY) {
        if char_len(&sentence) > max_len {
            // The sentence alone blows the budget: flush and descend to
            // clause, then word granularity.
            flush(&mut chunks, &mut current);
            pack_long_sentence(&sentence, max_len, &mut chunks);
            continue;
        }

        if fits(&current, &sentence, max_len) {
            append(&mut current, &sentence);
        } else {
            flush(&mut chunks, &mut current);
            current = sentence;
        }
    }
    flush(&mut chunks, &mut current);

    chunks
}

fn pack_long_sentence(sentence: &str, max_len: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();

    for clause in split_with_pattern(sentence, &CLAUSE_BOUNDARY) {
        if char_len(&clause) > max_len {
            flush(chunks, &mut current);
            pack_words(&clause, max_len, chunks);
            continue;
        }

        if fits(&current, &clause, max_len) {
            append(&mut current, &clause);
        } else {
            flush(chunks, &mut current);
            current = clause;
        }
    }
    flush(chunks, &mut current);
}

fn pack_words(text: &str, max_len: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();

    for word in text.split_whitespace() {
        if char_len(word) > max_len {
            // Indivisible token: emit intact even though it exceeds the cap.
            flush(chunks, &mut current);
            chunks.push(word.to_string());
            continue;
        }

        if fits(&current, word, max_len) {
            append(&mut current, word);
        } else {
            flush(chunks, &mut current);
            current = word.to_string();
        }
    }
    flush(chunks, &mut current);
}

/// Split `text` on a boundary pattern, keeping the boundary character with
/// the preceding segment and the unmatched tail as the final segment.
fn split_with_pattern(text: &str, pattern: &Regex) -> Vec<String> {
    let mut segments = Vec::new();
    let mut last_end = 0;

    for caps in pattern.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let segment = caps.get(1).unwrap().as_str().trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        last_end = whole.end();
    }

    let tail = text[last_end..].trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }

    segments
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn fits(current: &str, addition: &str, max_len: usize) -> bool {
    if current.is_empty() {
        char_len(addition) <= max_len
    } else {
        char_len(current) + 1 + char_len(addition) <= max_len
    }
}

fn append(current: &mut String, addition: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(addition);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoined_words(chunks: &[String]) -> Vec<String> {
        chunks
            .join(" ")
            .split_whitespace()
            .map(|w| w.to_string())
            .collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Hello world.", 100);
        assert_eq!(chunks, vec!["Hello world."]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   ", 10).is_empty());
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = "First sentence here. Second sentence here. Third one.";
        let chunks = chunk_text(text, 25);
        assert_eq!(
            chunks,
            vec!["First sentence here.", "Second sentence here.", "Third one."]
        );
    }

    #[test]
    fn test_falls_back_to_clause_boundaries() {
        let text = "one two three, four five six, seven eight nine";
        let chunks = chunk_text(text, 16);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 16, "chunk too long: {:?}", chunk);
        }
        assert_eq!(
            rejoined_words(&chunks),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_word_order_preserved_across_chunks() {
        let text = "The quick brown fox jumps over the lazy dog. And then it \
                    ran away, far into the woods; nobody saw it again!";
        for max_len in [5usize, 9, 17, 30, 64] {
            let chunks = chunk_text(text, max_len);
            assert_eq!(
                rejoined_words(&chunks),
                text.split_whitespace().collect::<Vec<_>>(),
                "word sequence must survive chunking at max_len={}",
                max_len
            );
        }
    }

    #[test]
    fn test_no_chunk_exceeds_limit_unless_single_word() {
        let text = "tiny words but supercalifragilisticexpialidocious is one token";
        let chunks = chunk_text(text, 10);
        for chunk in &chunks {
            if chunk.chars().count() > 10 {
                assert!(
                    !chunk.contains(' '),
                    "only an indivisible token may exceed the cap: {:?}",
                    chunk
                );
            }
        }
    }

    #[test]
    fn test_limit_of_one() {
        let chunks = chunk_text("a bc d", 1);
        assert_eq!(rejoined_words(&chunks), vec!["a", "bc", "d"]);
    }
}
