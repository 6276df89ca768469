//! Character-budget helpers shared by the normalizer and the validator

use regex::Regex;
use std::sync::OnceLock;

fn salient_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(traceback|exception|error|failed|failure|timeout|timed out|not found|invalid|permission denied|exit code|stack trace)\b",
        )
        .expect("valid regex")
    })
}

/// Whether a line carries a failure-indicator keyword
pub fn is_salient(line: &str) -> bool {
    salient_re().is_match(line)
}

/// First `max_chars` characters of `text`
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max_chars` characters of `text`
fn suffix_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    match text.char_indices().nth(total - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Trim and cap at `max_chars`, marking a cut with `...`
///
/// Returns the text and whether it was cut.
pub fn truncate(text: &str, max_chars: usize) -> (String, bool) {
    let text = text.trim();
    if max_chars == 0 {
        return (String::new(), !text.is_empty());
    }
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let head = prefix_chars(text, max_chars.saturating_sub(3)).trim_end();
    (format!("{head}..."), true)
}

/// Shorten text to `max_chars` while keeping the lines most likely to be
/// evidence: the first and last non-empty lines plus any failure lines.
/// Falls back to a head/tail split when that is still too long.
pub fn digest(text: &str, max_chars: usize) -> (String, bool) {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut chosen: Vec<&str> = Vec::new();
    if let Some(first) = lines.first() {
        chosen.push(first);
        if lines.len() > 1 {
            chosen.push(lines[lines.len() - 1]);
        }
    }
    for line in lines.iter().filter(|l| is_salient(l)) {
        if !chosen.contains(line) {
            chosen.push(line);
        }
    }

    let joined = chosen.join("\n");
    let (short, cut) = truncate(&joined, max_chars);
    if !cut {
        return (short, true);
    }

    let half = max_chars / 2;
    let head = prefix_chars(text, half).trim_end();
    let tail = if half > 0 {
        suffix_chars(text, half).trim_start()
    } else {
        ""
    };
    let combined = format!("{head}\n...\n{tail}");
    let (short, _) = truncate(&combined, max_chars);
    (short, true)
}
