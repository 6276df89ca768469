//! Ticket intermediate records planned from rollups

use crate::aggregate::{Rollup, SampleRef};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::sync::OnceLock;
use tracesift_core::Severity;

const TICKET_PRIORITY: u8 = 80;

/// Which rollups become new tickets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketPolicy {
    /// Only tiers at or below this value are ticketable
    pub min_tier: u8,
    pub min_sessions: usize,
    pub min_items: usize,
    /// Cap on `create` actions per run; updates are not capped
    pub max_create: usize,
}

impl TicketPolicy {
    pub fn new() -> Self {
        Self {
            min_tier: 1,
            min_sessions: 3,
            min_items: 10,
            max_create: 10,
        }
    }

    /// Tier gate, then critical severity or enough sessions or items
    pub fn is_ticketable(&self, rollup: &Rollup) -> bool {
        if rollup.tier > self.min_tier {
            return false;
        }
        rollup.max_severity == Severity::Critical
            || rollup.count_sessions >= self.min_sessions
            || rollup.count_items >= self.min_items
    }
}

impl Default for TicketPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketAction {
    Create,
    Update,
}

/// Tracker-agnostic ticket payload keyed by fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketIr {
    pub schema_version: u32,
    pub action: TicketAction,
    pub fingerprint_id: String,
    pub title: String,
    pub body: String,
    pub priority: u8,
    pub kind_v2_primary: String,
    pub kind_v2_counts: BTreeMap<String, usize>,
    pub max_severity: Severity,
    pub tier: u8,
    pub score: f64,
    pub count_items: usize,
    pub count_sessions: usize,
    pub tags_top: Vec<(String, usize)>,
    pub canonical_summary: String,
    pub sample_refs: Vec<SampleRef>,
}

impl TicketIr {
    pub fn from_rollup(rollup: &Rollup, action: TicketAction) -> Self {
        Self {
            schema_version: 1,
            action,
            fingerprint_id: rollup.fingerprint_id.clone(),
            title: format!("Signal: {}", rollup.canonical_summary),
            body: ticket_body(rollup),
            priority: TICKET_PRIORITY,
            kind_v2_primary: rollup.kind_v2_dominant.to_string(),
            kind_v2_counts: rollup.kind_v2_counts.clone(),
            max_severity: rollup.max_severity,
            tier: rollup.tier,
            score: rollup.score,
            count_items: rollup.count_items,
            count_sessions: rollup.count_sessions,
            tags_top: rollup.tags_top.clone(),
            canonical_summary: rollup.canonical_summary.clone(),
            sample_refs: rollup.sample_refs.clone(),
        }
    }
}

/// Plain-text ticket body describing one rollup
pub fn ticket_body(rollup: &Rollup) -> String {
    let tags = rollup
        .tags_top
        .iter()
        .map(|(t, n)| format!("{t}:{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let kinds = rollup
        .kind_v2_counts
        .iter()
        .map(|(k, n)| format!("{k}:{n}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = String::new();
    let _ = writeln!(body, "Fingerprint: {}", rollup.fingerprint_id);
    let _ = writeln!(body, "Canonical summary: {}", rollup.canonical_summary);
    let _ = writeln!(body, "kind_v2: {kinds}");
    let _ = writeln!(body, "max_severity: {}", rollup.max_severity);
    let _ = writeln!(
        body,
        "tier: {} reasons={}",
        rollup.tier,
        rollup.tier_reasons.join(",")
    );
    let _ = writeln!(body, "score: {:.3}", rollup.score);
    let _ = writeln!(
        body,
        "count_items: {} count_sessions: {}",
        rollup.count_items, rollup.count_sessions
    );
    let _ = writeln!(body, "tags_top: {tags}");
    let _ = writeln!(body, "samples:");
    if rollup.sample_refs.is_empty() {
        let _ = writeln!(body, "(none)");
    }
    for s in &rollup.sample_refs {
        let _ = writeln!(
            body,
            "- item_id={} session_id={} span={}-{} source={}",
            s.item_id, s.session_id, s.span.start_i, s.span.end_i, s.source.chunk_id
        );
    }
    body
}

/// `update` for fingerprints already seen, `create` for new ticketable ones
pub fn plan_tickets(rollups: &[Rollup], policy: &TicketPolicy, seen: &HashSet<String>) -> Vec<TicketIr> {
    let mut created = 0;
    let mut tickets = Vec::new();

    for rollup in rollups {
        if rollup.fingerprint_id.is_empty() {
            continue;
        }
        if seen.contains(&rollup.fingerprint_id) {
            tickets.push(TicketIr::from_rollup(rollup, TicketAction::Update));
            continue;
        }
        if created >= policy.max_create || !policy.is_ticketable(rollup) {
            continue;
        }
        created += 1;
        tickets.push(TicketIr::from_rollup(rollup, TicketAction::Create));
    }

    tracing::info!(
        tickets = tickets.len(),
        created,
        updates = tickets.len() - created,
        "planned tickets"
    );
    tickets
}

fn fingerprint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"fp1:[0-9a-f]{64}").expect("valid regex"))
}

/// Every fingerprint id mentioned anywhere in `text`
pub fn scan_fingerprints(text: &str) -> HashSet<String> {
    fingerprint_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
