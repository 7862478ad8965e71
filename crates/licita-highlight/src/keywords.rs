//! Keyword extraction from user questions.
//!
//! Questions are lower-cased, split on whitespace and `, . ; ?`, and stripped
//! of short tokens and Portuguese function words. What survives is what the
//! highlighter looks for in the answer.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Significant lower-case terms of a question. Ordered for deterministic patterns.
pub type KeywordSet = BTreeSet<String>;

/// Tokens of this many characters or fewer are never keywords.
const MIN_KEYWORD_CHARS: usize = 3;

/// Portuguese function words and question-frame verbs that never become keywords.
pub const STOP_WORDS: &[&str] = &[
    "a", "o", "e", "é", "de", "do", "da", "em", "um", "uma", "para", "com", "não",
    "os", "as", "dos", "das", "ao", "aos", "pelo", "pela", "qual", "quais", "quem",
    "onde", "quando", "como", "por", "que", "se", "me", "fale", "sobre", "existe",
    "há", "são", "informe", "diga", "resumo", "explique",
];

static STOP_WORD_SET: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| STOP_WORDS.iter().copied().collect());

static DELIMITER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,.;?]+").unwrap());

/// Whether `word` (already lower-case) is in the stop-word table.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

/// Extract the significant terms of a question.
///
/// Returns an empty set for empty input or input made only of stop words,
/// short tokens and punctuation.
pub fn extract_keywords(question: &str) -> KeywordSet {
    let lowered = question.to_lowercase();

    DELIMITER_RE
        .split(&lowered)
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}
