//! Grounding and schema validation of candidates

use crate::candidate::Candidate;
use serde_json::json;
use tracesift_core::{
    prefix_chars, prefixed_hash, truncate, Chunk, Constraints, Evidence, FixType, Kind,
    ProposedFix, Role, Severity, Signal, SignalSource, Span,
};

const MAX_TAG_CHARS: usize = 64;
const INCIDENT_TAG: &str = "incident";

/// Session a chunk belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub session_id: String,
    pub file_hint: String,
}

impl SessionRef {
    /// Identify a session by its path relative to the sessions directory
    pub fn from_relative_path(rel: &str) -> Self {
        let id = prefixed_hash("sha256", rel);
        Self {
            session_id: id.clone(),
            file_hint: id,
        }
    }
}

/// Why a candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownKind,
    EmptySummary,
    Ungrounded,
}

/// Trim and cap a quote, returning it only if it occurs verbatim in `text`
pub fn ground_quote(text: &str, quote: &str, max_chars: usize) -> Option<String> {
    let quote = quote.trim();
    if quote.is_empty() {
        return None;
    }
    let quote = prefix_chars(quote, max_chars).trim_end();
    if !quote.is_empty() && text.contains(quote) {
        Some(quote.to_string())
    } else {
        None
    }
}

fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        let tag = prefix_chars(&tag, MAX_TAG_CHARS).to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Content-derived signal identifier
///
/// Quotes are sorted so evidence order does not change the id.
pub fn signal_id(session_id: &str, kind: Kind, summary: &str, quotes: &[String]) -> String {
    let mut quotes = quotes.to_vec();
    quotes.sort();
    let seed = json!({
        "kind": kind.as_str(),
        "quotes": quotes,
        "session_id": session_id,
        "summary": summary,
    });
    prefixed_hash("sha256", &seed.to_string())
}

/// Validate one candidate against the chunk it came from
pub fn validate_candidate(
    candidate: &Candidate,
    chunk: &Chunk,
    constraints: &Constraints,
    session: &SessionRef,
    chunk_id: &str,
) -> Result<Signal, Rejection> {
    let kind = Kind::parse(&candidate.kind)
        .filter(|k| constraints.allows_kind(*k))
        .ok_or(Rejection::UnknownKind)?;

    let summary = candidate.summary.trim();
    if summary.is_empty() {
        return Err(Rejection::EmptySummary);
    }
    let (summary, _) = truncate(summary, constraints.max_summary_chars);

    let mut evidence = Vec::new();
    for entry in candidate
        .evidence
        .iter()
        .take(constraints.max_evidence_per_item)
    {
        let Some(view) = chunk.view(entry.event_i) else {
            continue;
        };
        let Some(quote) = ground_quote(&view.text, &entry.quote, constraints.max_quote_chars)
        else {
            continue;
        };
        evidence.push(Evidence {
            event_i: entry.event_i,
            role: entry
                .role
                .as_deref()
                .map(Role::from_raw)
                .unwrap_or(view.role),
            field_path: entry
                .field_path
                .clone()
                .unwrap_or_else(|| "text".to_string()),
            quote,
        });
    }
    if evidence.is_empty() {
        return Err(Rejection::Ungrounded);
    }

    let severity = candidate
        .severity
        .as_deref()
        .and_then(Severity::parse)
        .filter(|s| constraints.allows_severity(*s))
        .unwrap_or(Severity::Unknown);

    let confidence = candidate.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

    let mut tags = normalize_tags(&candidate.tags);
    let mentions_incident = summary.to_lowercase().contains(INCIDENT_TAG)
        || evidence
            .iter()
            .any(|e| e.quote.to_lowercase().contains(INCIDENT_TAG));
    if mentions_incident && !tags.iter().any(|t| t == INCIDENT_TAG) {
        tags.push(INCIDENT_TAG.to_string());
    }

    let proposed_fix = candidate.proposed_fix.as_ref().and_then(|fix| {
        let description = fix.description.trim();
        if description.is_empty() {
            return None;
        }
        Some(ProposedFix {
            fix_type: fix
                .fix_type
                .as_deref()
                .map(FixType::parse)
                .unwrap_or_default(),
            description: description.to_string(),
        })
    });

    let span = Span {
        start_i: evidence.iter().map(|e| e.event_i).min().unwrap_or(0),
        end_i: evidence.iter().map(|e| e.event_i).max().unwrap_or(0),
    };

    let quotes: Vec<String> = evidence.iter().map(|e| e.quote.clone()).collect();
    let item_id = signal_id(&session.session_id, kind, &summary, &quotes);

    Ok(Signal {
        schema_version: 1,
        item_id,
        session_id: session.session_id.clone(),
        source: SignalSource {
            file_hint: session.file_hint.clone(),
            chunk_id: chunk_id.to_string(),
        },
        kind,
        summary,
        severity,
        confidence,
        tags,
        span,
        evidence,
        proposed_fix,
    })
}

/// Signals accepted from one chunk plus the rejection count
#[derive(Debug, Clone, Default)]
pub struct ChunkValidation {
    pub signals: Vec<Signal>,
    pub rejected: usize,
}

/// Validate all candidates of a chunk, rank by confidence and cap
pub fn validate_chunk(
    candidates: &[Candidate],
    chunk: &Chunk,
    constraints: &Constraints,
    session: &SessionRef,
) -> ChunkValidation {
    let chunk_id = format!("{}/{}", session.session_id, chunk.chunk_id);
    let mut result = ChunkValidation::default();

    for candidate in candidates {
        match validate_candidate(candidate, chunk, constraints, session, &chunk_id) {
            Ok(signal) => result.signals.push(signal),
            Err(reason) => {
                tracing::trace!(chunk = %chunk_id, ?reason, "candidate rejected");
                result.rejected += 1;
            }
        }
    }

    result
        .signals
        .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    result.signals.truncate(constraints.max_items_per_chunk);

    if result.rejected > 0 {
        tracing::debug!(
            chunk = %chunk_id,
            accepted = result.signals.len(),
            rejected = result.rejected,
            "validated chunk candidates"
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateEvidence, CandidateFix};
    use proptest::prelude::*;
    use tracesift_core::EventView;

    fn view(i: usize, role: Role, text: &str) -> EventView {
        EventView {
            i,
            ts: None,
            role,
            tool: None,
            status: None,
            error_code: None,
            text: text.to_string(),
            text_truncated: false,
            raw_shape: None,
        }
    }

    fn chunk(views: Vec<EventView>) -> Chunk {
        Chunk {
            chunk_id: "chunk:0".to_string(),
            start_i: views.first().map(|v| v.i).unwrap_or(0),
            end_i: views.last().map(|v| v.i).unwrap_or(0),
            start: 0,
            end: views.len(),
            extended: false,
            views,
        }
    }

    fn session() -> SessionRef {
        SessionRef::from_relative_path("proj/session.jsonl")
    }

    fn evidence(event_i: usize, quote: &str) -> CandidateEvidence {
        CandidateEvidence {
            event_i,
            role: None,
            field_path: None,
            quote: quote.to_string(),
        }
    }

    fn candidate(kind: &str, summary: &str, evidence: Vec<CandidateEvidence>) -> Candidate {
        Candidate {
            kind: kind.to_string(),
            summary: summary.to_string(),
            evidence,
            ..Default::default()
        }
    }

    fn sample_chunk() -> Chunk {
        chunk(vec![
            view(1, Role::User, "this is confusing, not what I meant"),
            view(2, Role::ToolResult, "tool=bash\nstatus=error\nError: connection refused"),
        ])
    }

    #[test]
    fn test_accepts_grounded_candidate() {
        let c = Candidate {
            severity: Some("HIGH".to_string()),
            confidence: Some(1.7),
            tags: vec![" Network ".to_string(), "network".to_string()],
            proposed_fix: Some(CandidateFix {
                fix_type: Some("infra".to_string()),
                description: " retry with backoff ".to_string(),
            }),
            ..candidate(
                "error",
                "Connection refused by backend",
                vec![evidence(2, "Error: connection refused")],
            )
        };
        let signal =
            validate_candidate(&c, &sample_chunk(), &Constraints::new(), &session(), "s/chunk:0")
                .unwrap();
        assert_eq!(signal.kind, Kind::Error);
        assert_eq!(signal.severity, Severity::High);
        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.tags, vec!["network"]);
        assert_eq!(signal.evidence[0].role, Role::ToolResult);
        assert_eq!(signal.evidence[0].field_path, "text");
        assert_eq!(signal.span, Span { start_i: 2, end_i: 2 });
        let fix = signal.proposed_fix.unwrap();
        assert_eq!(fix.fix_type, FixType::Other);
        assert_eq!(fix.description, "retry with backoff");
        assert!(signal.item_id.starts_with("sha256:"));
    }

    #[test]
    fn test_rejects_unknown_kind_and_empty_summary() {
        let grounded = vec![evidence(1, "confusing")];
        let bad_kind = candidate("bug", "x", grounded.clone());
        let empty = candidate("error", "   ", grounded);
        let chunk = sample_chunk();
        let constraints = Constraints::new();
        assert_eq!(
            validate_candidate(&bad_kind, &chunk, &constraints, &session(), "c"),
            Err(Rejection::UnknownKind)
        );
        assert_eq!(
            validate_candidate(&empty, &chunk, &constraints, &session(), "c"),
            Err(Rejection::EmptySummary)
        );
    }

    #[test]
    fn test_rejects_hallucinated_or_misplaced_quotes() {
        let chunk = sample_chunk();
        let constraints = Constraints::new();
        let wrong_event = candidate("error", "refused", vec![evidence(1, "connection refused")]);
        let missing_event = candidate("error", "refused", vec![evidence(9, "connection refused")]);
        let invented = candidate("error", "refused", vec![evidence(2, "connection reset")]);
        for c in [wrong_event, missing_event, invented] {
            assert_eq!(
                validate_candidate(&c, &chunk, &constraints, &session(), "c"),
                Err(Rejection::Ungrounded)
            );
        }
    }

    #[test]
    fn test_unknown_severity_and_missing_confidence_default() {
        let c = Candidate {
            severity: Some("urgent".to_string()),
            ..candidate("user_frustration", "User confused", vec![evidence(1, "confusing")])
        };
        let signal =
            validate_candidate(&c, &sample_chunk(), &Constraints::new(), &session(), "c").unwrap();
        assert_eq!(signal.severity, Severity::Unknown);
        assert_eq!(signal.confidence, 0.5);
    }

    #[test]
    fn test_summary_and_quote_truncation() {
        let constraints = Constraints {
            max_summary_chars: 10,
            max_quote_chars: 9,
            ..Constraints::new()
        };
        let c = candidate(
            "user_frustration",
            "User was confused by the output",
            vec![evidence(1, "this is confusing, not what I meant")],
        );
        let signal =
            validate_candidate(&c, &sample_chunk(), &constraints, &session(), "c").unwrap();
        assert_eq!(signal.summary, "User wa...");
        assert_eq!(signal.evidence[0].quote, "this is c");
    }

    #[test]
    fn test_evidence_capped_before_validation() {
        let constraints = Constraints {
            max_evidence_per_item: 1,
            ..Constraints::new()
        };
        let c = candidate(
            "error",
            "refused",
            vec![evidence(1, "not present"), evidence(2, "connection refused")],
        );
        assert_eq!(
            validate_candidate(&c, &sample_chunk(), &constraints, &session(), "c"),
            Err(Rejection::Ungrounded)
        );
    }

    #[test]
    fn test_incident_tag_added() {
        let chunk = chunk(vec![view(3, Role::User, "please file an Incident report for this outage")]);
        let c = candidate("other", "Outage needs follow-up", vec![evidence(3, "Incident report")]);
        let signal =
            validate_candidate(&c, &chunk, &Constraints::new(), &session(), "c").unwrap();
        assert!(signal.has_tag("incident"));
    }

    #[test]
    fn test_identifier_is_stable_and_content_derived() {
        let chunk = sample_chunk();
        let constraints = Constraints::new();
        let c = candidate("error", "refused", vec![evidence(2, "connection refused")]);
        let a = validate_candidate(&c, &chunk, &constraints, &session(), "c").unwrap();
        let b = validate_candidate(&c, &chunk, &constraints, &session(), "c").unwrap();
        assert_eq!(a.item_id, b.item_id);

        let changed = candidate("error", "refused again", vec![evidence(2, "connection refused")]);
        let d = validate_candidate(&changed, &chunk, &constraints, &session(), "c").unwrap();
        assert_ne!(a.item_id, d.item_id);
    }

    #[test]
    fn test_signal_id_ignores_quote_order() {
        let quotes_a = vec!["b".to_string(), "a".to_string()];
        let quotes_b = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            signal_id("s", Kind::Error, "x", &quotes_a),
            signal_id("s", Kind::Error, "x", &quotes_b)
        );
    }

    #[test]
    fn test_validate_chunk_ranks_and_caps() {
        let constraints = Constraints {
            max_items_per_chunk: 1,
            ..Constraints::new()
        };
        let low = Candidate {
            confidence: Some(0.2),
            ..candidate("user_frustration", "confused", vec![evidence(1, "confusing")])
        };
        let high = Candidate {
            confidence: Some(0.9),
            ..candidate("error", "refused", vec![evidence(2, "connection refused")])
        };
        let bad = candidate("error", "refused", vec![evidence(2, "nope")]);
        let result = validate_chunk(&[low, high, bad], &sample_chunk(), &constraints, &session());
        assert_eq!(result.rejected, 1);
        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].kind, Kind::Error);
        assert!(result.signals[0].source.chunk_id.ends_with("/chunk:0"));
    }

    proptest! {
        #[test]
        fn prop_only_genuine_substrings_survive(
            text in "[a-z ]{5,60}",
            start in 0usize..60,
            len in 1usize..30,
            perturb in prop::bool::ANY,
        ) {
            let chars: Vec<char> = text.chars().collect();
            let start = start % chars.len();
            let end = (start + len).min(chars.len());
            let genuine: String = chars[start..end].iter().collect();
            prop_assume!(!genuine.trim().is_empty());

            let quote = if perturb { format!("{genuine}#") } else { genuine.clone() };
            let chunk = chunk(vec![view(0, Role::User, &text)]);
            let c = candidate("other", "observation", vec![evidence(0, &quote)]);
            let result = validate_candidate(&c, &chunk, &Constraints::new(), &session(), "c");

            if perturb {
                prop_assert_eq!(result, Err(Rejection::Ungrounded));
            } else {
                let signal = result.unwrap();
                for e in &signal.evidence {
                    prop_assert!(text.contains(&e.quote));
                }
            }
        }
    }
}
