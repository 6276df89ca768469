use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracesift_rollup::MergeMode;

#[derive(Parser)]
#[command(name = "tracesift")]
#[command(version)]
#[command(about = "Mine ranked, deduplicated signals from AI-agent session logs")]
pub struct Cli {
    /// JSON config file (missing file = defaults)
    #[arg(long, global = true, default_value = "tracesift.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract validated signals from session logs
    Mine(MineArgs),

    /// Group, rank and optionally merge mined signals
    Rollup(RollupArgs),

    /// Mine then roll up in one pass
    Run(RunArgs),

    /// Plan ticket records from a rollup document
    Export(ExportArgs),

    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LlmChoice {
    /// OpenAI-compatible endpoint from OPENAI_* env vars
    Openai,
    /// Built-in keyword heuristics
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeModeArg {
    Lexical,
    Vector,
}

impl From<MergeModeArg> for MergeMode {
    fn from(arg: MergeModeArg) -> Self {
        match arg {
            MergeModeArg::Lexical => MergeMode::Lexical,
            MergeModeArg::Vector => MergeMode::Vector,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MineArgs {
    /// Sessions directory (defaults to ~/.claude/projects)
    #[arg(long)]
    pub sessions_dir: Option<PathBuf>,

    /// Glob over relative session paths to keep (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Glob over relative session paths to drop (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    #[arg(long)]
    pub max_sessions: Option<usize>,

    #[arg(long, value_enum, default_value_t = LlmChoice::None)]
    pub llm: LlmChoice,

    /// Signals output
    #[arg(long, default_value = "signals.jsonl")]
    pub out_jsonl: PathBuf,

    /// Run report output
    #[arg(long)]
    pub out_json: Option<PathBuf>,

    #[arg(long)]
    pub chunk_events: Option<usize>,

    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RollupOptions {
    /// Markdown report output
    #[arg(long)]
    pub out_md: Option<PathBuf>,

    /// Merge near-duplicate rollups
    #[arg(long)]
    pub merge: bool,

    #[arg(long, value_enum)]
    pub merge_mode: Option<MergeModeArg>,

    /// Ask the oracle about ambiguous pairs
    #[arg(long)]
    pub merge_judge: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RollupArgs {
    /// Signals JSONL from `mine`
    #[arg(long)]
    pub in_jsonl: PathBuf,

    #[arg(long, default_value = "rollup.json")]
    pub out_json: PathBuf,

    #[command(flatten)]
    pub options: RollupOptions,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub mine: MineArgs,

    /// Rollup document output
    #[arg(long, default_value = "rollup.json")]
    pub rollup_json: PathBuf,

    #[command(flatten)]
    pub options: RollupOptions,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Rollup document from `rollup`
    #[arg(long)]
    pub in_json: PathBuf,

    /// Any text file listing fingerprints that already have tickets
    #[arg(long)]
    pub seen: Option<PathBuf>,

    #[arg(long, default_value = "ticket_ir.jsonl")]
    pub out_jsonl: PathBuf,

    #[arg(long)]
    pub min_tier: Option<u8>,

    #[arg(long)]
    pub min_sessions: Option<usize>,

    #[arg(long)]
    pub min_items: Option<usize>,

    #[arg(long)]
    pub max_create: Option<usize>,
}
