use crate::cli::{LlmChoice, MineArgs};
use crate::config::FileConfig;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracesift_core::{MinerConfig, Signal};
use tracesift_extract::{Extractor, HeuristicExtractor, MineReport, Miner};
use tracesift_llm::{OpenAiClient, OpenAiConfig, OracleExtractor};
use tracesift_log::{atomic_write, default_sessions_dir, write_jsonl, SessionFilter};

/// File config with command-line overrides applied
pub fn miner_config(args: &MineArgs, config: &FileConfig) -> MinerConfig {
    let mut miner = config.miner.clone();
    if let Some(n) = args.chunk_events {
        miner.chunk_events = n;
    }
    if let Some(n) = args.chunk_overlap {
        miner.chunk_overlap = n;
    }
    if let Some(n) = args.workers {
        miner.workers = n;
    }
    miner
}

pub fn session_filter(args: &MineArgs) -> SessionFilter {
    let mut filter = SessionFilter::new();
    for pattern in &args.include {
        filter = filter.include(pattern.clone());
    }
    for pattern in &args.exclude {
        filter = filter.exclude(pattern.clone());
    }
    if let Some(max) = args.max_sessions {
        filter = filter.max_sessions(max);
    }
    filter
}

fn extractor(choice: LlmChoice, miner: &MinerConfig) -> anyhow::Result<Arc<dyn Extractor>> {
    match choice {
        LlmChoice::None => Ok(Arc::new(HeuristicExtractor::new())),
        LlmChoice::Openai => {
            let config = OpenAiConfig::from_env()?.with_timeout(miner.oracle_timeout_secs);
            Ok(Arc::new(OracleExtractor::new(OpenAiClient::new(config)?)))
        }
    }
}

fn sessions_dir(args: &MineArgs) -> anyhow::Result<PathBuf> {
    args.sessions_dir
        .clone()
        .or_else(default_sessions_dir)
        .context("no sessions directory; pass --sessions-dir")
}

pub async fn mine(args: &MineArgs, config: &FileConfig) -> anyhow::Result<(MineReport, Vec<Signal>)> {
    let dir = sessions_dir(args)?;
    let miner_config = miner_config(args, config);
    let extractor = extractor(args.llm, &miner_config)?;
    let miner = Miner::new(miner_config, extractor);
    let result = miner.mine_dir(&dir, &session_filter(args)).await?;
    Ok(result)
}

/// Persist signals and, if asked, the run report
pub fn write_outputs(args: &MineArgs, report: &MineReport, signals: &[Signal]) -> anyhow::Result<()> {
    write_jsonl(&args.out_jsonl, signals)
        .with_context(|| format!("failed to write {}", args.out_jsonl.display()))?;
    if let Some(path) = &args.out_json {
        atomic_write(path, &serde_json::to_vec_pretty(report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!(
        "[mine] wrote {} items={} sessions={} failed={} extractor={}",
        args.out_jsonl.display(),
        report.items,
        report.sessions_scanned,
        report.sessions_failed,
        report.extractor
    );
    Ok(())
}

pub async fn run(args: &MineArgs, config: &FileConfig) -> anyhow::Result<()> {
    let (report, signals) = mine(args, config).await?;
    write_outputs(args, &report, &signals)
}
