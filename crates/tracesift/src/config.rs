use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracesift_core::MinerConfig;
use tracesift_rollup::{MergeConfig, RollupConfig, TicketPolicy};

/// Optional `tracesift.json`; every section falls back to defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub miner: MinerConfig,
    pub rollup: RollupConfig,
    pub merge: MergeConfig,
    pub tickets: TicketPolicy,
}

impl FileConfig {
    /// A missing file means defaults; an unreadable or invalid one is an error
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}
