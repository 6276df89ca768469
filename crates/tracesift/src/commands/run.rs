use crate::cli::RunArgs;
use crate::commands::{mine, rollup};
use crate::config::FileConfig;

pub async fn run(args: &RunArgs, config: &FileConfig) -> anyhow::Result<()> {
    let (report, signals) = mine::mine(&args.mine, config).await?;
    mine::write_outputs(&args.mine, &report, &signals)?;

    let doc = rollup::build(&signals, &args.options, config).await?;
    rollup::write_outputs(&doc, &args.rollup_json, args.options.out_md.as_deref())
}
