//! Configuration for mining

use crate::types::{Kind, Severity};
use serde::{Deserialize, Serialize};

/// Limits applied to every extracted candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub max_items_per_chunk: usize,
    pub max_evidence_per_item: usize,
    pub max_summary_chars: usize,
    pub max_quote_chars: usize,
    pub allowed_kinds: Vec<Kind>,
    pub allowed_severities: Vec<Severity>,
}

impl Constraints {
    pub fn new() -> Self {
        Self {
            max_items_per_chunk: 10,
            max_evidence_per_item: 2,
            max_summary_chars: 120,
            max_quote_chars: 200,
            allowed_kinds: Kind::ALL.to_vec(),
            allowed_severities: Severity::ALL.to_vec(),
        }
    }

    pub fn allows_kind(&self, kind: Kind) -> bool {
        self.allowed_kinds.contains(&kind)
    }

    pub fn allows_severity(&self, severity: Severity) -> bool {
        self.allowed_severities.contains(&severity)
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self::new()
    }
}

/// Mining configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Target window size in events
    pub chunk_events: usize,

    /// Events shared between consecutive windows
    pub chunk_overlap: usize,

    /// Character budget for each event digest
    pub max_text_chars: usize,

    /// Redact event text before digesting
    pub redact_events: bool,

    /// Concurrent chunk extractions
    pub workers: usize,

    /// Per-chunk extractor timeout
    pub oracle_timeout_secs: u64,

    pub constraints: Constraints,
}

impl MinerConfig {
    pub fn new() -> Self {
        Self {
            chunk_events: 20,
            chunk_overlap: 4,
            max_text_chars: 800,
            redact_events: true,
            workers: default_workers(),
            oracle_timeout_secs: 120,
            constraints: Constraints::new(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Available parallelism capped at 8
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}
