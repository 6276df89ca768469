//! Signature engine: coarse content-derived grouping keys

use crate::tokens::{bigrams, normalize, tokens};
use tracesift_core::{prefixed_hash, redact, Signal};

const MAX_BIGRAMS: usize = 6;
const MAX_SIGNATURE_TAGS: usize = 5;
const MAX_TAG_CHARS: usize = 32;
const MAX_FINGERPRINT_TAGS: usize = 5;

/// Grouping key plus the text it was hashed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub id: String,
    pub text: String,
}

fn tag_core(tags: &[String], limit: usize) -> String {
    let mut tags: Vec<String> = tags.iter().map(|t| redact(&t.to_lowercase())).collect();
    tags.sort();
    tags.iter()
        .take(limit)
        .map(|t| t.chars().take(MAX_TAG_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
}

/// `kind|first bigrams of the redacted summary|sorted tags`, hashed as `sig1:`
pub fn signature(signal: &Signal) -> Signature {
    let summary = redact(&signal.summary);
    let grams = bigrams(&tokens(&summary));
    let gram_core = grams
        .iter()
        .take(MAX_BIGRAMS)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let text = redact(&format!(
        "{}|{}|{}",
        signal.kind.as_str(),
        gram_core,
        tag_core(&signal.tags, MAX_SIGNATURE_TAGS)
    ));
    Signature {
        id: prefixed_hash("sig1", &text),
        text,
    }
}

/// `fp1:` key over a rollup's dominant secondary kind, normalized
/// canonical summary and top tags
pub fn fingerprint(dominant: &str, canonical_summary: &str, top_tags: &[String]) -> Signature {
    let text = redact(&format!(
        "{}|{}|{}",
        dominant,
        normalize(&redact(canonical_summary)),
        tag_core(top_tags, MAX_FINGERPRINT_TAGS)
    ));
    Signature {
        id: prefixed_hash("fp1", &text),
        text,
    }
}
