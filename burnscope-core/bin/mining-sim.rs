// bin/mining-sim.rs - Honest vs colluding mining simulator
use anyhow::Result;
use burnscope_core::{SimConfig, Simulation};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mining-sim")]
#[command(about = "Simulate a mining scenario with honest and colluding miners", long_about = None)]
struct Args {
    /// Print per-fork and per-miner details
    #[arg(short, long)]
    verbose: bool,

    /// Number of honest miners
    #[arg(long, default_value = "3")]
    honest: usize,

    /// Number of colluding miners
    #[arg(long, default_value = "2")]
    colluding: usize,

    /// Number of mining rounds to simulate
    #[arg(long, default_value = "10000")]
    rounds: u64,

    /// Gap allowed on the colluding fork before colluders rejoin the longest chain
    #[arg(long, default_value = "5")]
    gap: u64,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.honest + args.colluding == 0 {
        anyhow::bail!("At least one miner is required");
    }

    let config = SimConfig {
        honest: args.honest,
        colluding: args.colluding,
        rounds: args.rounds,
        gap: args.gap,
        seed: args.seed,
    };
    let stats = Simulation::run(&config).statistics();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", stats.render(args.verbose));
    }
    Ok(())
}
