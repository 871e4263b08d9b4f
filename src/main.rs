//! block-logic - Main Entry Point
//!
//! Loads a plot snapshot, runs it for a number of ticks and prints the final
//! output of every block as JSON.
//!
//! ```text
//! block-logic <plot.json> [--ticks N] [--config PATH]
//! ```

use anyhow::Context;
use block_logic::{
    config::{default_config_path, EngineConfig},
    PlotSnapshot, Simulation,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run a block logic plot and print its outputs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Plot snapshot (JSON)
    plot: PathBuf,

    /// Number of ticks to run; overrides `max_ticks` from the config
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Engine config file; defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => EngineConfig::load(path)?,
        None => default_config_path()
            .map(EngineConfig::load_or_default)
            .unwrap_or_default(),
    };
    if args.ticks.is_some() {
        config.max_ticks = args.ticks;
    }
    // Default to a single tick when nothing sets a limit.
    if config.max_ticks.is_none() {
        config.max_ticks = Some(1);
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting block-logic on {:?}", args.plot);

    let catalog = Arc::new(config.load_catalog().context("Failed to load block catalog")?);
    let plot = PlotSnapshot::load(&args.plot)
        .with_context(|| format!("Failed to load plot {:?}", args.plot))?;
    let mut sim = Simulation::from_snapshot(catalog, config, &plot)?;

    let running = AtomicBool::new(true);
    let tick = sim.run(&running);
    tracing::info!("Finished after {} ticks", tick);

    println!("{}", serde_json::to_string_pretty(&sim.read_outputs())?);
    Ok(())
}
