#![allow(dead_code)]
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use case::PipeCase;
use config::CaseConfig;

mod boundary;
mod case;
mod checkpoint;
mod config;
mod domain;
mod error;
mod monitor;
mod numerical;
mod poisson;
mod solver;

/// Sets up a periodic pipe flow case and writes its initial diagnostics.
#[derive(Parser)]
#[command(name = "pipeflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Periodic pipe flow on a staggered grid with an immersed wall", long_about = None)]
struct Cli {
    /// JSON parameter file; defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkpoint to restart from, overriding `restart_file`
    #[arg(short, long)]
    restart: Option<PathBuf>,

    /// Write a checkpoint of the initial state once setup completes
    #[arg(long)]
    checkpoint: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => CaseConfig::load(path)?,
        None => CaseConfig::default(),
    };
    if let Some(restart) = cli.restart {
        config.restart_file = restart.to_string_lossy().into_owned();
    }

    let mut case = PipeCase::setup(config)?;
    info!(
        start = ?case.start_mode(),
        step = case.sim.time.step,
        time = case.sim.time.time,
        end_time = case.sim.time.end_time,
        div_max = ?case.sim_monitor().last_value("div_max"),
        "Setup complete; initial diagnostics written to {} and {}",
        case.sim_monitor().path().display(),
        case.cfl_monitor().path().display()
    );
    if cli.checkpoint {
        let path = case.write_checkpoint()?;
        info!(path = %path.display(), "Initial state checkpointed");
    }
    Ok(())
}
