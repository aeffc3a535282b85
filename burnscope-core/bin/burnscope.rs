// bin/burnscope.rs - Burnscope analyzer
use anyhow::Result;
use burnscope_common::prelude::*;
use burnscope_core::{Observer, Runner, ScopeConfig, SqliteSources};
use burnscope_rpc::ReportCache;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "burnscope")]
#[command(about = "Proof-of-burn block-commit graph analyzer", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    config_path: PathBuf,

    /// Window spans to analyze (defaults to the configured block_counts)
    block_counts: Vec<u64>,

    /// Run in observer mode (as a server)
    #[arg(long)]
    observer: bool,

    /// Print the stats of each window to the console
    #[arg(long)]
    print_stats: bool,

    /// Burn block height at which to analyze
    #[arg(long)]
    at_tip: Option<BurnHeight>,

    /// Log level (overrides the configured one)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    let config = ScopeConfig::load(&args.config_path)
        .map_err(|e| anyhow::anyhow!("Config validation failed: {}", e))?;

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let block_counts = if args.block_counts.is_empty() {
        config.block_counts.clone()
    } else {
        args.block_counts.clone()
    };
    ValidationUtils::validate_block_counts(&block_counts)?;

    // Log configuration
    tracing::info!("Configuration:");
    tracing::info!("  Database: {}", config.db_path);
    tracing::info!("  Output: {}", config.output_dir);
    tracing::info!("  Windows: {:?}", block_counts);
    tracing::info!("  Max fork depth: {}", config.max_fork_depth);

    let sources = SqliteSources::from_config(&config);
    let runner = Runner::new(config, sources, ReportCache::new());

    if args.observer {
        tracing::info!("Running in observer mode...");
        let observer = Observer::new(runner, block_counts);

        let initial = observer.clone();
        let outcome = tokio::task::spawn_blocking(move || initial.run_blocking()).await?;
        if let TriggerOutcome::Failed(message) = outcome {
            tracing::warn!("Initial analysis failed: {}", message);
        }

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Received shutdown signal - stopping observer...");
                    std::process::exit(0);
                }
                Err(err) => {
                    tracing::error!("Unable to listen for shutdown signal: {}", err);
                }
            }
        });

        return observer.serve().await;
    }

    let at_tip = args.at_tip;
    let print_stats = args.print_stats;
    let reports =
        tokio::task::spawn_blocking(move || runner.run_once(at_tip, &block_counts)).await??;

    if print_stats {
        for report in &reports {
            println!("{}", report.summary());
        }
    }
    Ok(())
}
