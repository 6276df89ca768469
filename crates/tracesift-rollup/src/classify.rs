//! Secondary classification of signals
//!
//! The rule table is data: it ships with a default and can be replaced
//! from configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracesift_core::{Kind, Signal};

/// Narrower taxonomy used for blocking merges and ticket routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryKind {
    Defect,
    ReliabilityPerf,
    UxFriction,
    ProcessTooling,
    CapabilityGap,
    SafetyCompliance,
}

impl SecondaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryKind::Defect => "defect",
            SecondaryKind::ReliabilityPerf => "reliability_perf",
            SecondaryKind::UxFriction => "ux_friction",
            SecondaryKind::ProcessTooling => "process_tooling",
            SecondaryKind::CapabilityGap => "capability_gap",
            SecondaryKind::SafetyCompliance => "safety_compliance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        [
            SecondaryKind::Defect,
            SecondaryKind::ReliabilityPerf,
            SecondaryKind::UxFriction,
            SecondaryKind::ProcessTooling,
            SecondaryKind::CapabilityGap,
            SecondaryKind::SafetyCompliance,
        ]
        .into_iter()
        .find(|k| k.as_str() == raw)
    }
}

impl fmt::Display for SecondaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the classification table
///
/// Matches when the signal's kind is in `kinds` (empty = any kind) and,
/// if `terms` or `tags` are given, the lower-cased summary contains a term
/// or the signal carries one of the tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    #[serde(default)]
    pub kinds: Vec<Kind>,
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub secondary: SecondaryKind,
    pub reason: String,
}

impl ClassificationRule {
    fn matches(&self, kind: Kind, summary_lower: &str, tags: &[String]) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&kind) {
            return false;
        }
        if self.terms.is_empty() && self.tags.is_empty() {
            return true;
        }
        self.terms.iter().any(|t| summary_lower.contains(t.as_str()))
            || self
                .tags
                .iter()
                .any(|t| tags.iter().any(|s| s.eq_ignore_ascii_case(t)))
    }
}

/// Ordered rules; first match wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationTable {
    pub rules: Vec<ClassificationRule>,
    pub fallback: SecondaryKind,
    pub fallback_reason: String,
}

fn rule(kinds: &[Kind], terms: &[&str], tags: &[&str], secondary: SecondaryKind, reason: &str) -> ClassificationRule {
    ClassificationRule {
        kinds: kinds.to_vec(),
        terms: terms.iter().map(|s| s.to_string()).collect(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
        secondary,
        reason: reason.to_string(),
    }
}

const SUGGESTIONS: &[Kind] = &[Kind::ImprovementSuggestion, Kind::ExperimentSuggestion];
const PROCESS_TERMS: &[&str] = &["triage", "rollup", "pipeline", "logging", "metrics"];

impl ClassificationTable {
    pub fn new() -> Self {
        use SecondaryKind::*;
        Self {
            rules: vec![
                rule(
                    &[Kind::Error],
                    &[
                        "timeout",
                        "timed out",
                        "rate limit",
                        "usage limit",
                        "quota",
                        "latency",
                        "slow",
                        "flaky",
                        "unavailable",
                        "connection refused",
                    ],
                    &[],
                    ReliabilityPerf,
                    "error:reliability_perf",
                ),
                rule(&[Kind::Error], &[], &[], Defect, "error:defect"),
                rule(
                    &[Kind::UserFrustration],
                    &[],
                    &[],
                    UxFriction,
                    "user_frustration:ux_friction",
                ),
                rule(
                    SUGGESTIONS,
                    &["eval", "evaluation", "benchmark", "ablation", "experiment"],
                    &[],
                    ProcessTooling,
                    "suggestion:process_tooling",
                ),
                rule(
                    SUGGESTIONS,
                    &["tool", "integration", "feature", "capability", "missing"],
                    &[],
                    CapabilityGap,
                    "suggestion:capability_gap",
                ),
                rule(
                    SUGGESTIONS,
                    &["clarity", "confus", "ux", "format", "explain", "prompt"],
                    &[],
                    UxFriction,
                    "suggestion:ux_friction",
                ),
                rule(
                    SUGGESTIONS,
                    &["timeout", "latency", "slow", "rate limit"],
                    &[],
                    ReliabilityPerf,
                    "suggestion:reliability_perf",
                ),
                rule(
                    SUGGESTIONS,
                    &["privacy", "pii", "safety", "policy", "refusal"],
                    &[],
                    SafetyCompliance,
                    "suggestion:safety_compliance",
                ),
                rule(
                    SUGGESTIONS,
                    PROCESS_TERMS,
                    &["process"],
                    ProcessTooling,
                    "suggestion:process_tooling",
                ),
                rule(SUGGESTIONS, &[], &[], UxFriction, "suggestion:ux_friction"),
                rule(
                    &[],
                    PROCESS_TERMS,
                    &["process"],
                    ProcessTooling,
                    "other:process_tooling",
                ),
            ],
            fallback: UxFriction,
            fallback_reason: "other:ux_friction".to_string(),
        }
    }

    /// Secondary kind and the reason string of the matching rule
    pub fn classify(&self, signal: &Signal) -> (SecondaryKind, &str) {
        let summary = signal.summary.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches(signal.kind, &summary, &signal.tags))
            .map(|r| (r.secondary, r.reason.as_str()))
            .unwrap_or((self.fallback, self.fallback_reason.as_str()))
    }
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse emotional tone of a signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Frustrated,
    #[default]
    Neutral,
}

const FRUSTRATION_MARKERS: &[&str] = &["frustrat", "confus", "annoy", "upset", "not what i meant"];

pub fn sentiment(signal: &Signal) -> Sentiment {
    if signal.kind == Kind::UserFrustration {
        return Sentiment::Frustrated;
    }
    let summary = signal.summary.to_lowercase();
    if FRUSTRATION_MARKERS.iter().any(|m| summary.contains(m)) {
        Sentiment::Frustrated
    } else {
        Sentiment::Neutral
    }
}
