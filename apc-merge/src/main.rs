//! apc-merge - APC master dataset reconciliation
//!
//! Merges per-institution APC report files into the DOI-keyed master
//! dataset, normalizing publisher names (name map + Crossref lookup) and
//! escalating merge conflicts to the operator.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use apc_merge::config;
use apc_merge::crossref::CrossrefClient;
use apc_merge::decision::ConsoleDecisionSource;
use apc_merge::pipeline;

#[derive(Parser, Debug)]
#[command(name = "apc-merge")]
#[command(about = "Merge institutional APC reports into the master dataset")]
#[command(version)]
struct Cli {
    /// Incoming report files to merge (CSV, or TSV by extension)
    incoming: Vec<PathBuf>,

    /// File listing incoming report paths, one per line (# comments)
    #[arg(long)]
    file_list: Option<PathBuf>,

    /// Master dataset file (overrides config and APC_MASTER_FILE)
    #[arg(long)]
    master: Option<PathBuf>,

    /// Publisher name map file (overrides config and APC_PUBLISHER_MAP)
    #[arg(long)]
    publisher_map: Option<PathBuf>,

    /// TOML config file (default: ./apc-merge.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Be more verbose during processing
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    info!(
        "Starting apc-merge v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let paths = config::resolve_paths(cli.master, cli.publisher_map, cli.config.as_deref())?;
    info!("Master file: {}", paths.master_file.display());
    info!("Publisher map: {}", paths.publisher_map_file.display());

    let mut incoming = cli.incoming;
    if let Some(file_list) = &cli.file_list {
        incoming.extend(pipeline::read_file_list(file_list)?);
    }
    if incoming.is_empty() {
        bail!("no incoming files given (pass paths or --file-list)");
    }

    let lookup = CrossrefClient::new()?;
    let mut decisions = ConsoleDecisionSource::new();

    let summary = pipeline::run_session(&paths, &incoming, &lookup, &mut decisions).await?;
    summary.log();

    Ok(())
}
