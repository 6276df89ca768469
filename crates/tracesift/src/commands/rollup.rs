use crate::cli::{RollupArgs, RollupOptions};
use crate::commands::report::build_report;
use crate::config::FileConfig;
use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use tracesift_core::Signal;
use tracesift_llm::{OpenAiClient, OpenAiConfig, OracleEmbedder, OracleJudge};
use tracesift_log::{atomic_write, read_jsonl};
use tracesift_rollup::{Aggregator, MergeConfig, MergeMode, Merger, RollupDocument};

/// File config with command-line overrides applied
pub fn merge_config(options: &RollupOptions, config: &FileConfig) -> MergeConfig {
    let mut merge = config.merge.clone();
    if let Some(mode) = options.merge_mode {
        merge.mode = mode.into();
    }
    if options.merge_judge {
        merge.use_judge = true;
    }
    merge
}

/// Oracle client for the merge pass, or `None` when it cannot be built
fn oracle_client(timeout_secs: u64) -> Option<OpenAiClient> {
    let client = OpenAiConfig::from_env().and_then(|c| OpenAiClient::new(c.with_timeout(timeout_secs)));
    match client {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!("merge oracle unavailable, merging without it: {e}");
            None
        }
    }
}

/// Aggregate, optionally merge, and wrap into a rollup document
pub async fn build(signals: &[Signal], options: &RollupOptions, config: &FileConfig) -> anyhow::Result<RollupDocument> {
    let aggregator = Aggregator::new(config.rollup.clone());
    let clusters = aggregator.rollup(signals);

    if !options.merge {
        return Ok(RollupDocument::new(&clusters, signals.len(), 0));
    }

    let merge = merge_config(options, config);
    let mut merger = Merger::new(merge.clone(), aggregator);
    let needs_oracle = merge.use_judge || merge.mode == MergeMode::Vector;
    if let Some(client) = needs_oracle.then(|| oracle_client(merge.judge_timeout_secs)).flatten() {
        if merge.use_judge {
            merger = merger.with_judge(Arc::new(OracleJudge::new(client.clone())));
        }
        if merge.mode == MergeMode::Vector {
            merger = merger.with_embedder(Arc::new(OracleEmbedder::new(client)));
        }
    }

    let (clusters, report) = merger.merge(clusters).await;
    Ok(RollupDocument::new(&clusters, signals.len(), report.merged_groups()))
}

pub fn write_outputs(doc: &RollupDocument, out_json: &Path, out_md: Option<&Path>) -> anyhow::Result<()> {
    atomic_write(out_json, &serde_json::to_vec_pretty(doc)?)
        .with_context(|| format!("failed to write {}", out_json.display()))?;
    if let Some(path) = out_md {
        atomic_write(path, build_report(doc).as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!(
        "[rollup] wrote {} groups={} items={} merged={}",
        out_json.display(),
        doc.summary.counts.groups,
        doc.summary.counts.items,
        doc.summary.counts.merged_groups
    );
    Ok(())
}

pub async fn run(args: &RollupArgs, config: &FileConfig) -> anyhow::Result<()> {
    if !args.in_jsonl.exists() {
        bail!("signals file not found: {}", args.in_jsonl.display());
    }
    let signals: Vec<Signal> = read_jsonl(&args.in_jsonl)
        .with_context(|| format!("failed to read {}", args.in_jsonl.display()))?;
    let doc = build(&signals, &args.options, config).await?;
    write_outputs(&doc, &args.out_json, args.options.out_md.as_deref())
}
