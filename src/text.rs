//! Text utilities shared by the resolvers and the pipeline
//!
//! Three different tokenizations are used on purpose:
//! - [`source_tokens`] feeds morphology and dictionary lookup (whitespace split,
//!   edge punctuation stripped, single characters dropped)
//! - [`letter_runs`] feeds glossary matching (maximal runs of letters)
//! - [`similarity_tokens`] feeds retrieval scoring (case-folded word set)

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Marker appended to content cut at the truncation limit
pub const TRUNCATION_MARKER: &str = "... [truncated]";

static LETTER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{M}]+").expect("letter-run pattern is valid"));

/// Boilerplate lead-ins models like to put in front of a translation.
/// Applied in order, case-insensitive, anchored at every line start.
static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?im)^(Here is|The translation|The meaning|Output|The English translation).*?:",
        r"(?im)^Translation:",
        r"(?im)^Revised Translation:",
        r"(?im)^Answer:",
        r"(?im)^Summary:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("boilerplate pattern is valid"))
    .collect()
});

fn is_edge_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '।' | '॥' | '“' | '”' | '‘' | '’')
}

/// Tokens considered for morphology and dictionary lookup, in source order.
/// Duplicates are kept; callers deduplicate where needed.
pub fn source_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(is_edge_punctuation))
        .filter(|w| w.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Distinct maximal runs of letters (combining marks included, so IAST
/// diacritics and Devanagari vowel signs stay inside their word)
pub fn letter_runs(text: &str) -> BTreeSet<String> {
    LETTER_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Case-folded word set used for lexical similarity
pub fn similarity_tokens(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(is_edge_punctuation).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Strip boilerplate lead-ins and surrounding quotes from model output
pub fn clean_response(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text.to_string();
    for pattern in BOILERPLATE.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}

/// Cut `content` to at most `limit` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed
pub fn truncate_chars(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &content[..byte_idx], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

/// True if the text contains any Devanagari codepoint
pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_translation_prefix_and_quotes() {
        assert_eq!(
            clean_response("Translation: \"the king rules\""),
            "the king rules"
        );
    }

    #[test]
    fn test_clean_here_is_lead_in() {
        assert_eq!(
            clean_response("Here is the English translation: The sage spoke."),
            "The sage spoke."
        );
    }

    #[test]
    fn test_clean_is_case_insensitive_and_multiline() {
        let raw = "Some preface\nREVISED TRANSLATION: 'Dharma protects.'";
        assert_eq!(clean_response(raw), "Some preface\n 'Dharma protects.");
        assert_eq!(clean_response("answer: ok"), "ok");
    }

    #[test]
    fn test_clean_leaves_plain_text() {
        assert_eq!(clean_response("  The king rules.  "), "The king rules.");
        assert_eq!(clean_response(""), "");
    }

    #[test]
    fn test_source_tokens_strip_and_filter() {
        let tokens = source_tokens("rāmaḥ, vanam | gacchati. a ॥");
        assert_eq!(tokens, vec!["rāmaḥ", "vanam", "gacchati"]);
    }

    #[test]
    fn test_letter_runs_keep_diacritics() {
        let runs = letter_runs("The king of dharma, the Dharmā-rāja.");
        assert!(runs.contains("dharma"));
        assert!(runs.contains("Dharmā"));
        assert!(runs.contains("rāja"));
        assert!(!runs.iter().any(|r| r.contains(',')));
    }

    #[test]
    fn test_letter_runs_devanagari_word_stays_whole() {
        let runs = letter_runs("धर्मस्य रक्षा");
        assert!(runs.contains("धर्मस्य"));
        assert!(runs.contains("रक्षा"));
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_similarity_tokens_case_folded() {
        let tokens = similarity_tokens("Rāma went. rāma");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("rāma"));
        assert!(tokens.contains("went"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc... [truncated]");
        // Limit counts characters, not bytes
        assert_eq!(truncate_chars("āāāā", 2), "āā... [truncated]");
    }

    #[test]
    fn test_contains_devanagari() {
        assert!(contains_devanagari("धर्म"));
        assert!(!contains_devanagari("dharma"));
    }
}
