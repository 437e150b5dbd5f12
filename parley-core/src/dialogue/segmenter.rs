//! Sentence segmentation for generated replies.
//!
//! Purely punctuation based: a sentence ends at `.`, `?` or `!` followed by
//! whitespace. Abbreviations such as "Mr. Smith" are split like any other
//! boundary.

use once_cell::sync::Lazy;
use regex::Regex;

/// Terminal punctuation followed by the whitespace that separates sentences.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.?!]\s+").expect("sentence boundary pattern is valid"));

/// Split text into display-ready sentences.
///
/// The terminating punctuation stays with its sentence and the separating
/// whitespace is dropped. Empty and whitespace-only fragments are discarded,
/// so `split("")` and `split("   ")` both yield nothing.
pub fn split(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // punctuation is a single ASCII byte
        let end = boundary.start() + 1;
        push_fragment(&mut sentences, &text[start..end]);
        start = boundary.end();
    }
    push_fragment(&mut sentences, &text[start..]);

    sentences
}

/// Flatten line breaks and trim outer whitespace before segmentation.
pub fn clean(text: &str) -> String {
    text.replace('\n', " ").replace('\r', "").trim().to_string()
}

/// Clean then split, the way replies are prepared for reveal.
pub fn prepare(text: &str) -> Vec<String> {
    split(&clean(text))
}

fn push_fragment(sentences: &mut Vec<String>, fragment: &str) {
    if !fragment.trim().is_empty() {
        sentences.push(fragment.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_two_sentences() {
        assert_eq!(
            split("Hello there. How are you?"),
            vec!["Hello there.", "How are you?"]
        );
    }

    #[test]
    fn test_split_empty_and_blank() {
        assert!(split("").is_empty());
        assert!(split("   ").is_empty());
    }

    #[test]
    fn test_split_mixed_punctuation() {
        let sentences = split("Stop! Who goes there? A friend.");
        assert_eq!(sentences, vec!["Stop!", "Who goes there?", "A friend."]);
    }

    #[test]
    fn test_split_requires_whitespace_after_punctuation() {
        assert_eq!(split("Version 1.5 is out."), vec!["Version 1.5 is out."]);
        assert_eq!(split("Wait... what?"), vec!["Wait...", "what?"]);
    }

    #[test]
    fn test_split_does_not_special_case_abbreviations() {
        assert_eq!(split("Ask Mr. Smith."), vec!["Ask Mr.", "Smith."]);
    }

    #[test]
    fn test_split_trailing_whitespace_is_discarded() {
        assert_eq!(split("One. Two.   "), vec!["One.", "Two."]);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean("Hi\r\nthere.\n"), "Hi there.");
        assert_eq!(clean("  \n "), "");
    }

    #[test]
    fn test_clean_then_split_single_sentence() {
        let sentences = split(&clean("Hi\r\nthere.\n"));
        assert_eq!(sentences, vec!["Hi there."]);
        assert_eq!(prepare("Hi\r\nthere.\n"), sentences);
    }

    #[test]
    fn test_multiline_reply() {
        let reply = "Welcome, traveler.\nI lost my lantern!\r\nWill you find it?";
        assert_eq!(
            prepare(reply),
            vec!["Welcome, traveler.", "I lost my lantern!", "Will you find it?"]
        );
    }
}
