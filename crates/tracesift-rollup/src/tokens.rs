//! Summary tokenization for signatures and lexical similarity

use std::collections::BTreeSet;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "on", "for", "with", "by", "is", "are", "was",
    "were", "be", "this", "that", "it", "as", "at", "from", "into", "we", "you", "they", "i", "our",
    "your", "their",
];

// Longest first so "-ing" wins over "-s" style endings.
const SUFFIXES: &[&str] = &["ing", "ion", "ed", "es", "s"];
const MIN_STEM_CHARS: usize = 3;

/// Lower-case, replace non-alphanumerics with spaces, collapse whitespace
pub fn normalize(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized tokens without stop-words
///
/// Falls back to every token when filtering would leave nothing.
pub fn tokens(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let filtered: Vec<String> = normalized
        .split_whitespace()
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect();
    if !filtered.is_empty() {
        return filtered;
    }
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Consecutive token pairs joined with `_`; fewer than two tokens pass through
pub fn bigrams(tokens: &[String]) -> Vec<String> {
    if tokens.len() < 2 {
        return tokens.to_vec();
    }
    tokens
        .windows(2)
        .map(|pair| format!("{}_{}", pair[0], pair[1]))
        .collect()
}

/// Strip one common inflection suffix
pub fn stem(token: &str) -> &str {
    for suffix in SUFFIXES {
        if let Some(base) = token.strip_suffix(suffix) {
            if base.len() >= MIN_STEM_CHARS {
                return base;
            }
        }
    }
    token
}

/// Stemmed token set used for lexical similarity
pub fn lexical_set(text: &str) -> BTreeSet<String> {
    tokens(text)
        .iter()
        .map(|t| stem(t).to_string())
        .collect()
}
