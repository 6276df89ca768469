mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::FileConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Commands::Version = cli.command {
        return commands::version::run();
    }
    let config = FileConfig::load(&cli.config)?;

    match cli.command {
        Commands::Mine(args) => commands::mine::run(&args, &config).await,
        Commands::Rollup(args) => commands::rollup::run(&args, &config).await,
        Commands::Run(args) => commands::run::run(&args, &config).await,
        Commands::Export(args) => commands::export::run(&args, &config),
        Commands::Version => commands::version::run(),
    }
}
