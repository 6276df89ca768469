//! Core types for signal mining

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized role of a session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Originator turn (the human)
    User,
    /// Responder turn (the agent)
    Assistant,
    /// Tool invocation
    ToolCall,
    /// Tool result
    ToolResult,
    System,
    /// Line that failed to parse
    ParseError,
    Other,
}

impl Role {
    /// Map a raw role string from any supported log format
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "user" | "human" => Role::User,
            "assistant" => Role::Assistant,
            "toolCall" | "tool_call" | "tool_use" => Role::ToolCall,
            "toolResult" | "tool_result" | "tool" => Role::ToolResult,
            "system" => Role::System,
            "parse_error" => Role::ParseError,
            _ => Role::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolCall => "tool_call",
            Role::ToolResult => "tool_result",
            Role::System => "system",
            Role::ParseError => "parse_error",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventView {
    /// 0-based position of the record in the session
    pub i: usize,
    pub ts: Option<String>,
    pub role: Role,
    pub tool: Option<String>,
    pub status: Option<String>,
    pub error_code: Option<String>,
    /// Length-bounded digest of the event text
    pub text: String,
    pub text_truncated: bool,
    /// Where the text came from in the raw record
    pub raw_shape: Option<String>,
}

/// Contiguous window of event views submitted to extraction together
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// `chunk:<n>`
    pub chunk_id: String,
    /// Record index of the first view
    pub start_i: usize,
    /// Record index of the last view
    pub end_i: usize,
    /// Position range in the session's view list (end exclusive)
    pub start: usize,
    pub end: usize,
    /// Whether the window was extended past its nominal size
    pub extended: bool,
    pub views: Vec<EventView>,
}

impl Chunk {
    /// Look up a view by record index
    pub fn view(&self, i: usize) -> Option<&EventView> {
        self.views
            .binary_search_by_key(&i, |v| v.i)
            .ok()
            .map(|pos| &self.views[pos])
    }
}

/// Primary signal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Error,
    UserFrustration,
    ImprovementSuggestion,
    ExperimentSuggestion,
    ProactiveOpportunity,
    UserDelight,
    Other,
}

impl Kind {
    pub const ALL: [Kind; 7] = [
        Kind::Error,
        Kind::UserFrustration,
        Kind::ImprovementSuggestion,
        Kind::ExperimentSuggestion,
        Kind::ProactiveOpportunity,
        Kind::UserDelight,
        Kind::Other,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Error => "error",
            Kind::UserFrustration => "user_frustration",
            Kind::ImprovementSuggestion => "improvement_suggestion",
            Kind::ExperimentSuggestion => "experiment_suggestion",
            Kind::ProactiveOpportunity => "proactive_opportunity",
            Kind::UserDelight => "user_delight",
            Kind::Other => "other",
        }
    }

    pub fn is_suggestion(&self) -> bool {
        matches!(self, Kind::ImprovementSuggestion | Kind::ExperimentSuggestion)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal severity, ordered `unknown < low < medium < high < critical`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Unknown,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Case-insensitive parse; `None` for anything outside the enumeration
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn rank(&self) -> u8 {
        match self {
            Severity::Unknown => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-substring quote from one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub event_i: usize,
    pub role: Role,
    #[serde(default = "default_field_path")]
    pub field_path: String,
    pub quote: String,
}

fn default_field_path() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    Prompt,
    Code,
    Process,
    Dependency,
    Eval,
    #[default]
    Other,
}

impl FixType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "prompt" => FixType::Prompt,
            "code" => FixType::Code,
            "process" => FixType::Process,
            "dependency" => FixType::Dependency,
            "eval" => FixType::Eval,
            _ => FixType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedFix {
    #[serde(default)]
    pub fix_type: FixType,
    pub description: String,
}

/// Provenance of a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSource {
    pub file_hint: String,
    pub chunk_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_i: usize,
    pub end_i: usize,
}

/// Validated, evidence-grounded observation extracted from a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub item_id: String,
    pub session_id: String,
    pub source: SignalSource,
    pub kind: Kind,
    pub summary: String,
    #[serde(default)]
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub span: Span,
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub proposed_fix: Option<ProposedFix>,
}

fn default_schema_version() -> u32 {
    1
}

impl Signal {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
