//! Pattern-based masking of secrets and personal data
//!
//! Applied to event text before digesting and again to every summary,
//! signature text and fingerprint text before it is persisted or rendered.

use regex::Regex;
use std::sync::OnceLock;

struct RedactRule {
    pattern: &'static str,
    replacement: &'static str,
}

// Order matters: URL forms go first so later rules never see half a URL,
// and credentialed URLs of any scheme go before the email and IP rules.
const RULES: &[RedactRule] = &[
    RedactRule {
        pattern: r#"(?i)\b[a-z][a-z0-9+.-]*://[^\s/@:]+:[^\s/@]+@[^\s\])>"']*"#,
        replacement: "[url]",
    },
    RedactRule {
        pattern: r#"(?i)\bhttps?://[^\s\])>"']*(?:X-Amz-|Signature=|sig=|token=)[^\s\])>"']*"#,
        replacement: "[url]",
    },
    RedactRule {
        pattern: r#"(?i)\b(https?://[^\s\])>"'?]+)\?[^\s\])>"']+"#,
        replacement: "${1}[redacted_query]",
    },
    RedactRule {
        pattern: r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b",
        replacement: "[email]",
    },
    RedactRule {
        pattern: r"(?i)\bBearer\s+[A-Za-z0-9_\-.=]{20,}",
        replacement: "Bearer [token]",
    },
    RedactRule {
        pattern: r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+",
        replacement: "[token]",
    },
    RedactRule {
        pattern: r"\b(?:sk-[A-Za-z0-9_-]{8,}|(?i:api)-[A-Za-z0-9]{10,}|xox[baprs]-\S{6,}|ghp_\S{6,}|AKIA[A-Z0-9]{8,})",
        replacement: "[token]",
    },
    RedactRule {
        pattern: r"\b[0-9a-fA-F]{16,}\b",
        replacement: "[id]",
    },
    RedactRule {
        pattern: r"/(?:home|Users|root|var|etc|opt|srv)/\S*",
        replacement: "[path]",
    },
    RedactRule {
        pattern: r"(?i)\b[a-z]:\\Users\\\S*",
        replacement: "[path]",
    },
    RedactRule {
        pattern: r"~/\S*",
        replacement: "[path]",
    },
    RedactRule {
        pattern: r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
        replacement: "[ip]",
    },
    RedactRule {
        pattern: r"\b(?:\d[ -]*?){13,19}\b",
        replacement: "[fin_id]",
    },
    RedactRule {
        pattern: r"\b(?:\+?\d{1,3}[\s.-]?)?(?:\(?\d{3}\)?[\s.-]?)?\d{3}[\s.-]?\d{4}\b",
        replacement: "[phone]",
    },
];

fn compiled_rules() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                (
                    Regex::new(rule.pattern).expect("valid redaction regex"),
                    rule.replacement,
                )
            })
            .collect()
    })
}

/// Mask emails, credentialed/signed URLs, API-key-shaped tokens, home
/// paths, IPs, card-like and phone-like digit runs
pub fn redact(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = text.to_string();
    for (re, replacement) in compiled_rules() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}
