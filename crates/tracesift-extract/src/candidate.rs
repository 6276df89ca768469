//! Unvalidated candidate signals and lenient reply parsing

use crate::error::{ExtractError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Evidence entry as proposed by an extractor
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvidence {
    pub event_i: usize,
    pub role: Option<String>,
    pub field_path: Option<String>,
    pub quote: String,
}

/// Fix proposal as proposed by an extractor
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFix {
    pub fix_type: Option<String>,
    pub description: String,
}

/// Signal-shaped record that has not been validated yet
///
/// Everything is kept close to what the extractor produced; validation
/// decides what survives.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub kind: String,
    pub summary: String,
    pub severity: Option<String>,
    pub confidence: Option<f64>,
    pub tags: Vec<String>,
    pub evidence: Vec<CandidateEvidence>,
    pub proposed_fix: Option<CandidateFix>,
}

impl Candidate {
    /// Parse one reply item, dropping malformed parts
    ///
    /// Returns `None` when the item is not an object or lacks a string
    /// `kind`/`summary`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = obj.get("kind")?.as_str()?.to_string();
        let summary = obj.get("summary")?.as_str()?.to_string();

        let severity = obj
            .get("severity")
            .and_then(Value::as_str)
            .map(str::to_string);

        let tags = obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let evidence = obj
            .get("evidence")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(parse_evidence).collect())
            .unwrap_or_default();

        let proposed_fix = obj
            .get("proposed_fix")
            .and_then(Value::as_object)
            .and_then(|fix| {
                let description = fix.get("description")?.as_str()?.to_string();
                Some(CandidateFix {
                    fix_type: str_of(fix, "fix_type"),
                    description,
                })
            });

        Some(Self {
            kind,
            summary,
            severity,
            confidence: parse_confidence(obj.get("confidence")),
            tags,
            evidence,
            proposed_fix,
        })
    }
}

fn str_of(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_evidence(value: &Value) -> Option<CandidateEvidence> {
    let obj = value.as_object()?;
    let event_i = usize::try_from(obj.get("event_i")?.as_u64()?).ok()?;
    let quote = obj.get("quote")?.as_str()?.to_string();
    Some(CandidateEvidence {
        event_i,
        role: str_of(obj, "role"),
        field_path: str_of(obj, "field_path"),
        quote,
    })
}

/// Number or numeric string; anything else (including NaN) is absent
fn parse_confidence(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Parse an oracle reply: the first `{...}` span must hold an `items` array
pub fn parse_reply(text: &str) -> Result<Vec<Candidate>> {
    let span = json_object_re()
        .find(text)
        .ok_or_else(|| ExtractError::malformed("no JSON object in reply"))?;
    let payload: Value = serde_json::from_str(span.as_str())
        .map_err(|e| ExtractError::malformed(e.to_string()))?;
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::malformed("reply has no `items` array"))?;
    Ok(items.iter().filter_map(Candidate::from_value).collect())
}
