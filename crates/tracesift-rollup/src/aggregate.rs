//! Rollup aggregator: group signals by signature and rank the groups

use crate::classify::{sentiment, ClassificationTable, SecondaryKind, Sentiment};
use crate::counter::Counter;
use crate::signature::{fingerprint, signature, Signature};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracesift_core::{redact, Kind, Severity, Signal, SignalSource, Span};

const INCIDENT_TAG: &str = "incident";
const MAX_REASONS: usize = 2;
const FINGERPRINT_TAGS: usize = 5;

/// Rollup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    /// Sample references kept per rollup
    pub max_samples: usize,

    /// Top tags kept per rollup
    pub max_tags: usize,

    pub classification: ClassificationTable,
}

impl RollupConfig {
    pub fn new() -> Self {
        Self {
            max_samples: 3,
            max_tags: 8,
            classification: ClassificationTable::new(),
        }
    }
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Pointer back to a member signal, without its evidence text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRef {
    pub item_id: String,
    pub session_id: String,
    pub span: Span,
    pub source: SignalSource,
}

/// Aggregate over the signals sharing a signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub signature_id: String,
    pub signature_text: String,
    pub count_items: usize,
    pub count_sessions: usize,
    pub kind_counts: BTreeMap<String, usize>,
    pub kind_v2_counts: BTreeMap<String, usize>,
    pub kind_v2_dominant: SecondaryKind,
    pub kind_v2_reason_top: Vec<(String, usize)>,
    pub max_severity: Severity,
    /// 1 = urgent, 2 = elevated, 3 = default
    pub tier: u8,
    pub tier_reasons: Vec<String>,
    pub score: f64,
    pub tags_top: Vec<(String, usize)>,
    pub canonical_summary: String,
    pub sample_refs: Vec<SampleRef>,
    pub sentiment: Sentiment,
    pub fingerprint_id: String,
    pub fingerprint_text: String,
    pub merged_from: Vec<String>,
}

impl Rollup {
    pub fn top_tag_names(&self, n: usize) -> Vec<String> {
        self.tags_top.iter().take(n).map(|(t, _)| t.clone()).collect()
    }
}

/// A rollup together with the signals it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub rollup: Rollup,
    pub members: Vec<Signal>,
}

/// Tier 1 on incident or high/critical severity, tier 2 on error or
/// frustration kinds or medium severity, tier 3 otherwise
pub fn tier_for(max_severity: Severity, tags: &Counter, kinds: &Counter) -> (u8, Vec<String>) {
    let incident = tags.get(INCIDENT_TAG) > 0;
    let severe = max_severity >= Severity::High;
    if incident || severe {
        let mut reasons = Vec::new();
        if incident {
            reasons.push(INCIDENT_TAG.to_string());
        }
        if severe {
            reasons.push(format!("severity:{max_severity}"));
        }
        return (1, reasons);
    }

    let error = kinds.get(Kind::Error.as_str()) > 0;
    let frustration = kinds.get(Kind::UserFrustration.as_str()) > 0;
    let medium = max_severity == Severity::Medium;
    if error || frustration || medium {
        let mut reasons = Vec::new();
        if error {
            reasons.push("kind:error".to_string());
        }
        if frustration {
            reasons.push("kind:user_frustration".to_string());
        }
        if medium {
            reasons.push("severity:medium".to_string());
        }
        return (2, reasons);
    }

    (3, vec!["default".to_string()])
}

/// `ln(1 + items) + severity rank` plus incident/error/frustration bonuses
pub fn score_for(count_items: usize, max_severity: Severity, tags: &Counter, kinds: &Counter) -> f64 {
    let mut score = (count_items as f64).ln_1p() + f64::from(max_severity.rank());
    if tags.get(INCIDENT_TAG) > 0 {
        score += 2.0;
    }
    if kinds.get(Kind::Error.as_str()) > 0 {
        score += 0.3;
    }
    if kinds.get(Kind::UserFrustration.as_str()) > 0 {
        score += 0.2;
    }
    score
}

/// Order by tier ascending, then score descending
pub fn sort_clusters(clusters: &mut [Cluster]) {
    clusters.sort_by(|a, b| {
        a.rollup
            .tier
            .cmp(&b.rollup.tier)
            .then(b.rollup.score.total_cmp(&a.rollup.score))
    });
}

/// Groups signals by signature and computes rollups
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: RollupConfig,
}

impl Aggregator {
    pub fn new(config: RollupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    /// Group by signature id, aggregate each group, sort by (tier, -score)
    pub fn rollup(&self, signals: &[Signal]) -> Vec<Cluster> {
        let mut order: Vec<Signature> = Vec::new();
        let mut groups: HashMap<String, Vec<Signal>> = HashMap::new();

        for signal in signals {
            let sig = signature(signal);
            let members = groups.entry(sig.id.clone()).or_default();
            if members.is_empty() {
                order.push(sig);
            }
            members.push(signal.clone());
        }

        let mut clusters: Vec<Cluster> = order
            .into_iter()
            .map(|sig| {
                let members = groups.remove(&sig.id).unwrap_or_default();
                Cluster {
                    rollup: self.aggregate(&sig, &members),
                    members,
                }
            })
            .collect();
        sort_clusters(&mut clusters);

        tracing::debug!(
            signals = signals.len(),
            groups = clusters.len(),
            "rolled up signals"
        );
        clusters
    }

    /// Aggregate statistics for one group of signals
    pub fn aggregate(&self, sig: &Signature, members: &[Signal]) -> Rollup {
        let table = &self.config.classification;

        let sessions: HashSet<&str> = members
            .iter()
            .map(|m| m.session_id.as_str())
            .filter(|s| !s.is_empty())
            .collect();

        let kinds: Counter = members.iter().map(|m| m.kind.as_str()).collect();
        let tags: Counter = members
            .iter()
            .flat_map(|m| m.tags.iter().map(String::as_str))
            .collect();

        let mut kinds_v2 = Counter::new();
        let mut reasons = Counter::new();
        let mut sentiments = Counter::new();
        let mut max_severity = Severity::Unknown;
        for member in members {
            let (secondary, reason) = table.classify(member);
            kinds_v2.add(secondary.as_str());
            reasons.add(reason);
            sentiments.add(match sentiment(member) {
                Sentiment::Frustrated => "frustrated",
                Sentiment::Neutral => "neutral",
            });
            if member.severity > max_severity {
                max_severity = member.severity;
            }
        }

        let summaries: Vec<String> = members
            .iter()
            .filter(|m| !m.summary.is_empty())
            .map(|m| redact(&m.summary))
            .collect();
        let canonical_summary = summaries
            .iter()
            .map(String::as_str)
            .collect::<Counter>()
            .top()
            .unwrap_or_default()
            .to_string();

        let kind_v2_dominant = kinds_v2
            .top()
            .and_then(SecondaryKind::parse)
            .unwrap_or(table.fallback);

        let (tier, tier_reasons) = tier_for(max_severity, &tags, &kinds);
        let score = score_for(members.len(), max_severity, &tags, &kinds);

        let tags_top: Vec<(String, usize)> = tags
            .most_common(self.config.max_tags)
            .into_iter()
            .map(|(t, n)| (redact(&t), n))
            .collect();
        let top_names: Vec<String> = tags_top
            .iter()
            .take(FINGERPRINT_TAGS)
            .map(|(t, _)| t.clone())
            .collect();
        let fp = fingerprint(kind_v2_dominant.as_str(), &canonical_summary, &top_names);

        let sample_refs = members
            .iter()
            .take(self.config.max_samples)
            .map(|m| SampleRef {
                item_id: m.item_id.clone(),
                session_id: m.session_id.clone(),
                span: m.span,
                source: m.source.clone(),
            })
            .collect();

        let sentiment = match sentiments.top() {
            Some("frustrated") => Sentiment::Frustrated,
            _ => Sentiment::Neutral,
        };

        Rollup {
            signature_id: sig.id.clone(),
            signature_text: redact(&sig.text),
            count_items: members.len(),
            count_sessions: sessions.len(),
            kind_counts: kinds.to_map(),
            kind_v2_counts: kinds_v2.to_map(),
            kind_v2_dominant,
            kind_v2_reason_top: reasons.most_common(MAX_REASONS),
            max_severity,
            tier,
            tier_reasons,
            score,
            tags_top,
            canonical_summary,
            sample_refs,
            sentiment,
            fingerprint_id: fp.id,
            fingerprint_text: fp.text,
            merged_from: vec![sig.id.clone()],
        }
    }
}

/// Group and item counts of a rollup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupCounts {
    pub items: usize,
    pub groups: usize,
    #[serde(default)]
    pub merged_groups: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupSummary {
    pub counts: RollupCounts,
    pub tiers: BTreeMap<String, usize>,
}

/// Persisted rollup output: summary plus ranked rollups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupDocument {
    pub summary: RollupSummary,
    pub rollups: Vec<Rollup>,
}

impl RollupDocument {
    pub fn new(clusters: &[Cluster], items: usize, merged_groups: usize) -> Self {
        let mut tiers = BTreeMap::new();
        for cluster in clusters {
            *tiers.entry(cluster.rollup.tier.to_string()).or_insert(0) += 1;
        }
        Self {
            summary: RollupSummary {
                counts: RollupCounts {
                    items,
                    groups: clusters.len(),
                    merged_groups,
                },
                tiers,
            },
            rollups: clusters.iter().map(|c| c.rollup.clone()).collect(),
        }
    }
}
