//! Deterministic keyword extractor

use crate::candidate::{Candidate, CandidateEvidence};
use crate::error::Result;
use crate::extractor::Extractor;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracesift_core::{prefix_chars, truncate, Chunk, Constraints, EventView, Kind, Role, Severity};

struct KeywordRule {
    kind: Kind,
    severity: Severity,
    confidence: f64,
    tag: &'static str,
    /// Only views with this role are checked; `None` checks every view
    role: Option<Role>,
    pattern: &'static str,
}

// Checked in order after the tool-failure rule; first match wins per view.
const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        kind: Kind::UserFrustration,
        severity: Severity::Medium,
        confidence: 0.4,
        tag: "frustration",
        role: Some(Role::User),
        pattern: r"(?i)\b(confus(ed|ing)|frustrat(ed|ing)|dont understand|don't understand|do not understand|wtf|not what i meant)\b",
    },
    KeywordRule {
        kind: Kind::ExperimentSuggestion,
        severity: Severity::Low,
        confidence: 0.3,
        tag: "experiment",
        role: None,
        pattern: r"(?i)\b(experiment|ablation|benchmark|eval|evaluation|hypothesis)\b",
    },
    KeywordRule {
        kind: Kind::ProactiveOpportunity,
        severity: Severity::Low,
        confidence: 0.3,
        tag: "opportunity",
        role: None,
        pattern: r"(?i)\b(reach out|outreach|share|publish|demo|hackathon|community|partner(ship)?|collab(orate)?|announce|publicize)\b",
    },
    KeywordRule {
        kind: Kind::UserDelight,
        severity: Severity::Low,
        confidence: 0.3,
        tag: "delight",
        role: None,
        pattern: r"(?i)\b(delight|wow|surprise|magical|polish|lovely|make it feel)\b",
    },
    KeywordRule {
        kind: Kind::ImprovementSuggestion,
        severity: Severity::Low,
        confidence: 0.3,
        tag: "suggestion",
        role: None,
        pattern: r"(?i)\b(we should|should we|suggest|improve|fix|add|change|avoid)\b",
    },
];

fn compiled_rules() -> &'static [(&'static KeywordRule, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static KeywordRule, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        KEYWORD_RULES
            .iter()
            .map(|rule| (rule, Regex::new(rule.pattern).expect("valid heuristic regex")))
            .collect()
    })
}

/// Keyword/regex rules applied per view
///
/// Produces the same candidate shape as an oracle so validation treats
/// both the same way.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_chunk(&self, chunk: &Chunk, constraints: &Constraints) -> Vec<Candidate> {
        let mut items = Vec::new();
        for view in &chunk.views {
            if items.len() >= constraints.max_items_per_chunk {
                break;
            }
            if view.text.is_empty() {
                continue;
            }
            if let Some(candidate) = match_view(view, constraints) {
                items.push(candidate);
            }
        }
        items
    }
}

fn is_tool_failure(view: &EventView) -> bool {
    view.role == Role::ToolResult
        && (view
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("error"))
            || view
                .error_code
                .as_deref()
                .is_some_and(|c| c.starts_with("EXIT_")))
}

fn match_view(view: &EventView, constraints: &Constraints) -> Option<Candidate> {
    if is_tool_failure(view) {
        let tags = view
            .tool
            .as_ref()
            .map(|t| vec![format!("tool:{t}")])
            .unwrap_or_default();
        return Some(candidate_for(
            view,
            constraints,
            Kind::Error,
            Severity::Medium,
            0.4,
            tags,
        ));
    }

    compiled_rules()
        .iter()
        .find(|(rule, re)| rule.role.map_or(true, |r| r == view.role) && re.is_match(&view.text))
        .map(|(rule, _)| {
            candidate_for(
                view,
                constraints,
                rule.kind,
                rule.severity,
                rule.confidence,
                vec![rule.tag.to_string()],
            )
        })
}

fn candidate_for(
    view: &EventView,
    constraints: &Constraints,
    kind: Kind,
    severity: Severity,
    confidence: f64,
    tags: Vec<String>,
) -> Candidate {
    let first_line = view.text.lines().next().unwrap_or_default();
    let (summary, _) = truncate(first_line, constraints.max_summary_chars);
    let quote = prefix_chars(&view.text, constraints.max_quote_chars).to_string();
    Candidate {
        kind: kind.as_str().to_string(),
        summary,
        severity: Some(severity.as_str().to_string()),
        confidence: Some(confidence),
        tags,
        evidence: vec![CandidateEvidence {
            event_i: view.i,
            role: Some(view.role.as_str().to_string()),
            field_path: Some("text".to_string()),
            quote,
        }],
        proposed_fix: None,
    }
}

#[async_trait]
impl Extractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract(&self, chunk: &Chunk, constraints: &Constraints) -> Result<Vec<Candidate>> {
        Ok(self.extract_chunk(chunk, constraints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate_chunk, SessionRef};

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
            start_i: views[0].i,
            end_i: views[views.len() - 1].i,
            start: 0,
            end: views.len(),
            extended: false,
            views,
        }
    }

    #[test]
    fn test_tool_failure_rule() {
        let mut failed = view(4, Role::ToolResult, "tool=bash\nstatus=error\ncommand not found");
        failed.tool = Some("bash".to_string());
        failed.status = Some("error".to_string());
        let mut exited = view(5, Role::ToolResult, "tool=cargo\nexitCode=101");
        exited.error_code = Some("EXIT_101".to_string());

        let items = HeuristicExtractor::new().extract_chunk(&chunk(vec![failed, exited]), &Constraints::new());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, "error");
        assert_eq!(items[0].tags, vec!["tool:bash"]);
        assert_eq!(items[0].summary, "tool=bash");
        assert!(items[1].tags.is_empty());
    }

    #[test]
    fn test_frustration_only_on_user_turns() {
        let views = vec![
            view(1, Role::User, "I'm so confused by this output"),
            view(2, Role::Assistant, "Sorry for the confusing output"),
        ];
        let items = HeuristicExtractor::new().extract_chunk(&chunk(views), &Constraints::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, "user_frustration");
        assert_eq!(items[0].evidence[0].event_i, 1);
    }

    #[test]
    fn test_rule_order_first_match_wins() {
        let views = vec![
            view(1, Role::Assistant, "We should run an ablation to compare"),
            view(2, Role::Assistant, "Let's publish a demo for the community"),
            view(3, Role::Assistant, "Add a little polish to make it feel magical"),
            view(4, Role::Assistant, "We should avoid retrying forever"),
            view(5, Role::Assistant, "All tests passed."),
        ];
        let items = HeuristicExtractor::new().extract_chunk(&chunk(views), &Constraints::new());
        let kinds: Vec<&str> = items.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "experiment_suggestion",
                "proactive_opportunity",
                "user_delight",
                "improvement_suggestion"
            ]
        );
    }

    #[test]
    fn test_caps_items_per_chunk() {
        let views: Vec<EventView> = (0..6)
            .map(|i| view(i, Role::Assistant, "we should improve this"))
            .collect();
        let constraints = Constraints {
            max_items_per_chunk: 3,
            ..Constraints::new()
        };
        let items = HeuristicExtractor::new().extract_chunk(&chunk(views), &constraints);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_heuristic_candidates_pass_validation() {
        let long = format!("we should improve this {}", "detail ".repeat(80));
        let views = vec![
            view(1, Role::User, "this is confusing"),
            view(2, Role::Assistant, &long),
        ];
        let chunk = chunk(views);
        let constraints = Constraints::new();
        let items = HeuristicExtractor::new().extract_chunk(&chunk, &constraints);
        let session = SessionRef::from_relative_path("a.jsonl");
        let result = validate_chunk(&items, &chunk, &constraints, &session);
        assert_eq!(result.rejected, 0);
        assert_eq!(result.signals.len(), 2);
    }
}
