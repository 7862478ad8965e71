//! Whole-word, case-insensitive keyword highlighting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::keywords::KeywordSet;

/// A contiguous span of text, emphasized or not.
///
/// Concatenating the spans of one call reproduces the input exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    #[serde(rename = "isHighlighted")]
    pub is_highlighted: bool,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_highlighted: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_highlighted: true,
        }
    }
}

/// A keyword set compiled into one alternation pattern.
///
/// `\b` and `(?i)` are Unicode-aware in `regex`, so accented words such as
/// `licitação` are bounded and case-folded correctly.
pub struct Highlighter {
    pattern: Option<Regex>,
}

impl Highlighter {
    /// Compile a highlighter. An empty set (or one holding only empty strings)
    /// highlights nothing.
    pub fn new(keywords: &KeywordSet) -> Self {
        let mut ordered: Vec<&str> = keywords
            .iter()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
            .collect();
        if ordered.is_empty() {
            return Self { pattern: None };
        }

        // Longest first, so the longer keyword wins when two start at the same offset.
        ordered.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let alternation = ordered
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = match Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(
                    keywords = ordered.len(),
                    "Highlight pattern rejected, rendering without emphasis: {}", e
                );
                None
            }
        };

        Self { pattern }
    }

    /// Whether this highlighter can ever emphasize anything.
    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    /// Partition `text` into alternating plain and highlighted segments.
    ///
    /// With `n` matches the result has `2n + 1` segments, starting and ending
    /// with a (possibly empty) plain segment.
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        let re = match &self.pattern {
            Some(re) => re,
            None => return vec![Segment::plain(text)],
        };

        let mut segments = Vec::new();
        let mut last_end = 0;

        for m in re.find_iter(text) {
            segments.push(Segment::plain(&text[last_end..m.start()]));
            segments.push(Segment::highlighted(m.as_str()));
            last_end = m.end();
        }
        segments.push(Segment::plain(&text[last_end..]));

        segments
    }
}

/// Highlight every whole-word, case-insensitive occurrence of `keywords` in `text`.
pub fn highlight_text(text: &str, keywords: &KeywordSet) -> Vec<Segment> {
    Highlighter::new(keywords).segments(text)
}
